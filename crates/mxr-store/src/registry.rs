use mxr_events::MatrixDescriptor;

/// Append-only list of the matrices announced on the stream.
///
/// Ids are not de-duplicated: a redelivered announcement adds a second entry.
#[derive(Clone, Debug, Default)]
pub struct MatrixRegistry {
    matrices: Vec<MatrixDescriptor>,
}

impl MatrixRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: MatrixDescriptor) {
        self.matrices.push(descriptor);
    }

    /// Descriptors in arrival order.
    pub fn list(&self) -> &[MatrixDescriptor] {
        &self.matrices
    }

    /// First descriptor registered under `id`.
    pub fn get(&self, id: &str) -> Option<&MatrixDescriptor> {
        self.matrices.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_arrival_order_and_duplicates() {
        let mut registry = MatrixRegistry::new();
        registry.register(MatrixDescriptor::new("b", 1, 1));
        registry.register(MatrixDescriptor::new("a", 2, 3));
        registry.register(MatrixDescriptor::new("b", 1, 1));

        let ids: Vec<_> = registry.list().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "b"]);
        assert_eq!(registry.get("a"), Some(&MatrixDescriptor::new("a", 2, 3)));
        assert_eq!(registry.get("missing"), None);
    }
}
