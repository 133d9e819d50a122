// docbridge-core/src/find_options.rs
// Find query options: projection, sort, limit, skip

use mongodb::bson::Document;
use mongodb::options::FindOptions as DriverFindOptions;

use crate::error::{DocBridgeError, Result};

/// Options for `find_many`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Projection: field → 1 (include) or 0 (exclude)
    pub projection: Option<Vec<(String, i32)>>,

    /// Sort: [(field, direction)], direction: 1 (asc) or -1 (desc)
    pub sort: Option<Vec<(String, i32)>>,

    /// Limit: maximum number of documents to return
    pub limit: Option<i64>,

    /// Skip: number of documents to skip (for pagination)
    pub skip: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: Vec<(String, i32)>) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_sort(mut self, sort: Vec<(String, i32)>) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Convert to the driver's options, keeping field order.
    pub fn into_driver(self) -> Result<DriverFindOptions> {
        let mut options = DriverFindOptions::default();

        if let Some(projection) = self.projection {
            let mut doc = Document::new();
            for (field, action) in projection {
                if action != 0 && action != 1 {
                    return Err(DocBridgeError::invalid(format!(
                        "projection for '{}' must be 0 or 1, got {}",
                        field, action
                    )));
                }
                doc.insert(field, action);
            }
            options.projection = Some(doc);
        }

        if let Some(sort) = self.sort {
            let mut doc = Document::new();
            for (field, direction) in sort {
                if direction != 1 && direction != -1 {
                    return Err(DocBridgeError::invalid(format!(
                        "sort direction for '{}' must be 1 or -1, got {}",
                        field, direction
                    )));
                }
                doc.insert(field, direction);
            }
            options.sort = Some(doc);
        }

        options.limit = self.limit;
        options.skip = self.skip;
        Ok(options)
    }
}
