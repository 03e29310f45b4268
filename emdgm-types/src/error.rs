use thiserror::Error;

/// Результат для операций emdgm
pub type DgmResult<T> = std::result::Result<T, DgmError>;

/// Типы ошибок кодека датаграмм.
#[derive(Debug, Error)]
pub enum DgmError {
    /// Длина/ETX/STX не согласованы в позиции `offset` (восстановимо)
    #[error("Framing error at offset {offset}: {reason}")]
    Framing { offset: u64, reason: String },

    /// Тип датаграммы отсутствует в реестре
    #[error("Unsupported datagram type: {0}")]
    UnsupportedType(u8),

    /// Заявленная структура длиннее доступных байт
    #[error("Truncated {what}: need {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    /// Значение не помещается в своё представление на диске
    #[error("Value {value} out of range for field '{field}'")]
    FieldEncoding { field: &'static str, value: f64 },

    /// Не передан обязательный контекстный параметр (время, разрешение)
    #[error("Missing decode context: {0}")]
    MissingContext(&'static str),

    /// Несовпадение контрольной суммы (ожидалось/найдено)
    #[error("Checksum mismatch: expected {expected:04x}, found {found:04x}")]
    ChecksumMismatch { expected: u16, found: u16 },

    /// Ошибки ввода/вывода (автоконвертируются из std::io::Error)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Нарушение формата
    #[error("Format violation: {0}")]
    FormatViolation(String),
}

impl DgmError {
    /// Удобные конструкторы
    pub fn framing<S: Into<String>>(
        offset: u64,
        reason: S,
    ) -> Self {
        Self::Framing {
            offset,
            reason: reason.into(),
        }
    }

    pub fn truncated(
        what: &'static str,
        needed: usize,
        available: usize,
    ) -> Self {
        Self::Truncated {
            what,
            needed,
            available,
        }
    }

    pub fn format_violation<S: Into<String>>(s: S) -> Self {
        Self::FormatViolation(s.into())
    }

    /// Ошибка, после которой сканирование файла можно продолжить.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Framing { .. } | Self::ChecksumMismatch { .. } | Self::UnsupportedType(_)
        )
    }
}
