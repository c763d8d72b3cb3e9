//! Document path layout.
//!
//! Public data lives under `artifacts/{appId}/public/data/{collection}`, with
//! one more `/{docId}` segment for documents, so document paths always have
//! an even number of segments.

use std::fmt;

use crate::error::AppError;

pub const ROOT_COLLECTION: &str = "artifacts";
pub const PUBLIC_COLLECTION: &str = "public";
pub const DATA_DOCUMENT: &str = "data";

fn check_segment(kind: &str, segment: &str) -> Result<(), AppError> {
    if segment.is_empty() || segment.contains('/') {
        return Err(AppError::BadRequest(format!(
            "invalid {kind} '{segment}': must be non-empty and must not contain '/'"
        )));
    }
    Ok(())
}

/// `artifacts/{appId}/public/data/{collection}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    app_id: String,
    collection: String,
}

impl CollectionPath {
    pub fn new(app_id: &str, collection: &str) -> Result<Self, AppError> {
        check_segment("app id", app_id)?;
        check_segment("collection", collection)?;
        Ok(Self {
            app_id: app_id.to_string(),
            collection: collection.to_string(),
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn doc(&self, doc_id: &str) -> Result<DocumentPath, AppError> {
        check_segment("document id", doc_id)?;
        Ok(DocumentPath {
            collection: self.clone(),
            doc_id: doc_id.to_string(),
        })
    }

    pub fn segments(&self) -> Vec<&str> {
        vec![
            ROOT_COLLECTION,
            self.app_id.as_str(),
            PUBLIC_COLLECTION,
            DATA_DOCUMENT,
            self.collection.as_str(),
        ]
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments().join("/"))
    }
}

/// `artifacts/{appId}/public/data/{collection}/{docId}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: CollectionPath,
    doc_id: String,
}

impl DocumentPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn segments(&self) -> Vec<&str> {
        let mut segments = self.collection.segments();
        segments.push(&self.doc_id);
        segments
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.doc_id)
    }
}
