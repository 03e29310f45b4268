use serde::{Deserialize, Serialize};

/// Порядок байт многобайтовых полей (одинаков для всего файла).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endian {
    /// Little-endian — порядок всех современных PU
    #[default]
    Little,
    /// Big-endian — старые системы на SPARC/PowerPC
    Big,
}

impl Endian {
    pub fn is_little(&self) -> bool {
        *self == Endian::Little
    }

    /// Противоположный порядок (для пробного определения).
    pub fn swapped(&self) -> Self {
        match self {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        }
    }
}

impl std::fmt::Display for Endian {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Endian::Little => write!(f, "little-endian"),
            Endian::Big => write!(f, "big-endian"),
        }
    }
}
