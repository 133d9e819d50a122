// docbridge-core/src/validate.rs
// Argument checks run before a driver call is attempted

use mongodb::bson::Document;

use crate::error::{DocBridgeError, Result};

pub fn non_empty(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DocBridgeError::invalid(format!("{} must not be empty", what)));
    }
    Ok(())
}

pub fn collection_name(name: &str) -> Result<()> {
    non_empty("collection name", name)?;
    if name.contains('$') || name.contains('\0') {
        return Err(DocBridgeError::invalid(format!(
            "collection name '{}' contains an illegal character",
            name.escape_default()
        )));
    }
    Ok(())
}

/// Payload for a `$set` update: non-empty, plain fields only
pub fn update_document(doc: &Document) -> Result<()> {
    if doc.is_empty() {
        return Err(DocBridgeError::invalid("update document must not be empty"));
    }
    if let Some(key) = doc.keys().find(|k| k.starts_with('$')) {
        return Err(DocBridgeError::invalid(format!(
            "update document must contain plain fields, found operator '{}'",
            key
        )));
    }
    Ok(())
}

pub fn documents<T>(docs: &[T]) -> Result<()> {
    if docs.is_empty() {
        return Err(DocBridgeError::invalid("documents must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_non_empty() {
        assert!(non_empty("id", "x").is_ok());
        let err = non_empty("id", "   ").unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: id must not be empty");
    }

    #[test]
    fn test_collection_name() {
        assert!(collection_name("test_collection").is_ok());
        assert!(collection_name("").is_err());
        assert!(collection_name("bad$name").is_err());
        assert!(collection_name("nul\0byte").is_err());
    }

    #[test]
    fn test_update_document() {
        assert!(update_document(&doc! { "name": "Raj" }).is_ok());
        assert!(update_document(&doc! {}).is_err());
        assert!(update_document(&doc! { "$inc": { "n": 1 } }).is_err());
    }

    #[test]
    fn test_documents() {
        assert!(documents::<i32>(&[]).is_err());
        assert!(documents(&[1]).is_ok());
    }
}
