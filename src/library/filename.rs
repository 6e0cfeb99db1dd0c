//! Title ID and version extraction from file names.
//!
//! Used when no container decoder can run. Names follow the common
//! `Name [0100ABCDEF012000][v65536].nsp` convention.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use super::decoder::ContentAttributes;
use super::ScanError;

fn title_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([A-Za-z0-9]{16})\]").expect("valid title ID pattern"))
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[vV]?([0-9]{1,10})\]").expect("valid version pattern"))
}

/// Extract the single title described by a file name
pub fn extract_from_filename(
    file_name: &str,
) -> Result<HashMap<String, ContentAttributes>, ScanError> {
    let title_id = title_id_regex()
        .captures(file_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
        .ok_or(ScanError::TitleId)?;

    let version = version_regex()
        .captures(file_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .ok_or(ScanError::TitleVersion)?;

    let attributes = ContentAttributes {
        title_id: title_id.clone(),
        version,
        ..Default::default()
    };
    Ok(HashMap::from([(title_id, attributes)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_id_and_version() {
        let result =
            extract_from_filename("Alpha Quest [0100aaaaaaaaa000][v131072].nsp").unwrap();
        let attrs = &result["0100AAAAAAAAA000"];
        assert_eq!(attrs.title_id, "0100AAAAAAAAA000");
        assert_eq!(attrs.version, 131072);
    }

    #[test]
    fn test_version_without_prefix() {
        let result = extract_from_filename("Pack [0100AAAAAAAAA001][0].nsp").unwrap();
        assert_eq!(result["0100AAAAAAAAA001"].version, 0);
    }

    #[test]
    fn test_missing_title_id() {
        assert!(matches!(
            extract_from_filename("Alpha Quest [v0].nsp"),
            Err(ScanError::TitleId)
        ));
    }

    #[test]
    fn test_missing_version() {
        assert!(matches!(
            extract_from_filename("Alpha Quest [0100AAAAAAAAA000].nsp"),
            Err(ScanError::TitleVersion)
        ));
    }
}
