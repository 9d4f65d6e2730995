//! Shape catalog: the schemas this subscriber claims to accept.

use sinkwell_protocol::types::{PropertyDefinition, ShapeDefinition};

/// Fixed set of shapes answered to `DiscoverShapes`.
///
/// The catalog is immutable for the lifetime of a session, so repeated
/// discovery calls always see the same shapes in the same order.
#[derive(Debug, Clone)]
pub struct ShapeCatalog {
    shapes: Vec<ShapeDefinition>,
}

impl ShapeCatalog {
    /// Build a catalog from an explicit shape list. Must be non-empty: a
    /// subscriber that accepts nothing has no reason to exist.
    pub fn with_shapes(shapes: Vec<ShapeDefinition>) -> Self {
        debug_assert!(!shapes.is_empty(), "shape catalog must not be empty");
        Self { shapes }
    }

    pub fn shapes(&self) -> &[ShapeDefinition] {
        &self.shapes
    }
}

impl Default for ShapeCatalog {
    /// The reference catalog: a single keyed test shape.
    fn default() -> Self {
        Self::with_shapes(vec![ShapeDefinition {
            name: "test-shape".to_string(),
            description: "test-shape description".to_string(),
            keys: vec!["ID".to_string()],
            properties: vec![
                PropertyDefinition {
                    name: "ID".to_string(),
                    data_type: "number".to_string(),
                },
                PropertyDefinition {
                    name: "Name".to_string(),
                    data_type: "string".to_string(),
                },
            ],
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_reference_shape() {
        let catalog = ShapeCatalog::default();
        let shapes = catalog.shapes();

        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].name, "test-shape");
        assert_eq!(shapes[0].keys, vec!["ID".to_string()]);
        assert_eq!(shapes[0].properties.len(), 2);
        assert_eq!(shapes[0].properties[0].name, "ID");
        assert_eq!(shapes[0].properties[0].data_type, "number");
        assert_eq!(shapes[0].properties[1].name, "Name");
        assert_eq!(shapes[0].properties[1].data_type, "string");
    }

    #[test]
    fn test_catalog_is_order_stable() {
        let catalog = ShapeCatalog::default();
        let first: Vec<String> = catalog.shapes().iter().map(|s| s.name.clone()).collect();
        let second: Vec<String> = catalog.shapes().iter().map(|s| s.name.clone()).collect();
        assert_eq!(first, second);
    }
}
