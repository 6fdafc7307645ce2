//! Anchors cached per feature-grid shape.
//!
//! Anchor sets depend only on the template and the grid shape, so each shape
//! is generated at most once and shared through an `Arc`. The map sits behind
//! an `RwLock`, letting per-image workers on different threads reuse entries.

use crate::anchor::AnchorGenerator;
use crate::geometry::BBox;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Lazily populated anchor sets keyed by `(height, width)`.
#[derive(Debug)]
pub struct AnchorCache {
    generator: AnchorGenerator,
    entries: RwLock<HashMap<(usize, usize), Arc<[BBox]>>>,
}

impl AnchorCache {
    pub fn new(generator: AnchorGenerator) -> Self {
        Self {
            generator,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn generator(&self) -> &AnchorGenerator {
        &self.generator
    }

    /// Returns the anchors for a grid shape, generating them on first use.
    pub fn get(&self, height: usize, width: usize) -> Arc<[BBox]> {
        let key = (height, width);
        if let Ok(entries) = self.entries.read() {
            if let Some(anchors) = entries.get(&key) {
                return Arc::clone(anchors);
            }
        }
        let anchors: Arc<[BBox]> = self.generator.generate(height, width).into();
        match self.entries.write() {
            Ok(mut entries) => Arc::clone(entries.entry(key).or_insert(anchors)),
            // A poisoned map only loses caching, the anchors are still correct.
            Err(_) => anchors,
        }
    }

    /// Number of cached grid shapes.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
