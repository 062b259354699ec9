//! Interning of compiled quantizers.
//!
//! Many networked objects of one archetype share a quantizer. The registry
//! hands out one `Arc` per distinct configuration, so identical setups
//! compare and hash cheaply and the bit tables are compiled once.
//!
//! The registry is a plain value owned by whoever composes the codec. There
//! is no global instance.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::element::{ElementQuantizer, ElementQuantizerBuilder};
use crate::error::CrusherResult;
use crate::quantize::{ScalarQuantizer, ScalarQuantizerBuilder};
use crate::transform::{TransformQuantizer, TransformQuantizerBuilder};

/// Set of interned values of one type.
#[derive(Debug)]
struct Pool<T> {
    entries: RwLock<HashSet<Arc<T>>>,
}

impl<T: Eq + Hash> Pool<T> {
    fn new() -> Self {
        Self { entries: RwLock::new(HashSet::new()) }
    }

    fn intern(&self, value: T, label: &str) -> Arc<T> {
        if let Some(existing) = self.entries.read().get(&value) {
            trace!("{} registry hit", label);
            return Arc::clone(existing);
        }

        let mut entries = self.entries.write();
        // Another thread may have inserted between the two locks.
        if let Some(existing) = entries.get(&value) {
            trace!("{} registry hit", label);
            return Arc::clone(existing);
        }
        let shared = Arc::new(value);
        entries.insert(Arc::clone(&shared));
        trace!("{} registry insert, {} entries", label, entries.len());
        shared
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Deduplicating store of compiled quantizers.
///
/// `Send + Sync`; share it behind an `Arc` if several systems build
/// quantizers.
#[derive(Debug)]
pub struct QuantizerRegistry {
    scalars: Pool<ScalarQuantizer>,
    elements: Pool<ElementQuantizer>,
    transforms: Pool<TransformQuantizer>,
}

impl QuantizerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { scalars: Pool::new(), elements: Pool::new(), transforms: Pool::new() }
    }

    /// Interns an already compiled scalar quantizer.
    pub fn intern_scalar(&self, quantizer: ScalarQuantizer) -> Arc<ScalarQuantizer> {
        self.scalars.intern(quantizer, "scalar")
    }

    /// Interns an already compiled element quantizer.
    pub fn intern_element(&self, quantizer: ElementQuantizer) -> Arc<ElementQuantizer> {
        self.elements.intern(quantizer, "element")
    }

    /// Interns an already compiled transform quantizer.
    pub fn intern_transform(&self, quantizer: TransformQuantizer) -> Arc<TransformQuantizer> {
        self.transforms.intern(quantizer, "transform")
    }

    /// Compiles and interns a scalar quantizer.
    ///
    /// # Errors
    ///
    /// Any error from [`ScalarQuantizerBuilder::build`].
    pub fn build_scalar(&self, builder: ScalarQuantizerBuilder) -> CrusherResult<Arc<ScalarQuantizer>> {
        Ok(self.intern_scalar(builder.build()?))
    }

    /// Compiles and interns an element quantizer.
    ///
    /// # Errors
    ///
    /// Any error from [`ElementQuantizerBuilder::build`].
    pub fn build_element(
        &self,
        builder: ElementQuantizerBuilder,
    ) -> CrusherResult<Arc<ElementQuantizer>> {
        Ok(self.intern_element(builder.build()?))
    }

    /// Compiles and interns a transform quantizer.
    ///
    /// # Errors
    ///
    /// Any error from [`TransformQuantizerBuilder::build`].
    pub fn build_transform(
        &self,
        builder: TransformQuantizerBuilder,
    ) -> CrusherResult<Arc<TransformQuantizer>> {
        Ok(self.intern_transform(builder.build()?))
    }

    /// Distinct scalar quantizers held.
    #[must_use]
    pub fn scalar_count(&self) -> usize {
        self.scalars.len()
    }

    /// Distinct element quantizers held.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Distinct transform quantizers held.
    #[must_use]
    pub fn transform_count(&self) -> usize {
        self.transforms.len()
    }

    /// Drops the registry's references. Outstanding `Arc`s stay valid.
    pub fn clear(&self) {
        self.scalars.clear();
        self.elements.clear();
        self.transforms.clear();
    }
}

impl Default for QuantizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
