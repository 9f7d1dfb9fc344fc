use serde::{Deserialize, Serialize};

/// Recognition engine class requested by a caller or preferred by a document type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    #[default]
    Auto,
    Fast,
    Enhanced,
}

impl OcrMode {
    /// Lenient parse used at the HTTP boundary: blank or unknown values mean `auto`.
    pub fn parse_or_auto(raw: Option<&str>) -> Self {
        raw.and_then(|value| value.parse().ok())
            .unwrap_or(OcrMode::Auto)
    }
}

impl std::fmt::Display for OcrMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Fast => write!(f, "fast"),
            Self::Enhanced => write!(f, "enhanced"),
        }
    }
}

impl std::str::FromStr for OcrMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "fast" => Ok(Self::Fast),
            "enhanced" => Ok(Self::Enhanced),
            _ => Err(format!("Unknown OCR mode: {s}")),
        }
    }
}

/// Outcome of a lookup whose absence is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_is_case_insensitive() {
        assert_eq!("FAST".parse::<OcrMode>().unwrap(), OcrMode::Fast);
        assert_eq!(" Enhanced ".parse::<OcrMode>().unwrap(), OcrMode::Enhanced);
        assert!("turbo".parse::<OcrMode>().is_err());
    }

    #[test]
    fn test_lenient_parse_defaults_to_auto() {
        assert_eq!(OcrMode::parse_or_auto(None), OcrMode::Auto);
        assert_eq!(OcrMode::parse_or_auto(Some("")), OcrMode::Auto);
        assert_eq!(OcrMode::parse_or_auto(Some("bogus")), OcrMode::Auto);
        assert_eq!(OcrMode::parse_or_auto(Some("enhanced")), OcrMode::Enhanced);
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        let json = serde_json::to_string(&OcrMode::Enhanced).unwrap();
        assert_eq!(json, "\"enhanced\"");
    }

    #[test]
    fn test_lookup_from_option() {
        let found: Lookup<u8> = Some(3).into();
        assert_eq!(found, Lookup::Found(3));
        let missing: Lookup<u8> = None.into();
        assert_eq!(missing, Lookup::NotFound);
    }
}
