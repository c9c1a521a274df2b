//! Property tests for the document format round-trip.

use camber_doc::mutate;
use camber_doc::{load_document, save_document, validate_invariants};
use camber_types::{new_id, Feature, FeatureKind, SketchFeature, SketchPlaneRef, SketchPoint};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any document built from valid mutations serializes to JSON and back
    /// without loss, and the loaded snapshot still satisfies every invariant.
    #[test]
    fn save_load_round_trip(
        name in "[a-zA-Z][a-zA-Z0-9 ]{0,24}",
        coords in prop::collection::vec((-1e4f64..1e4, -1e4f64..1e4), 0..12),
    ) {
        let mut store = mutate::new_document(name);
        let plane = store.snapshot().feature_order[1];
        let sketch = mutate::add_feature(
            &mut store,
            Feature::new(
                new_id(),
                FeatureKind::Sketch(SketchFeature {
                    plane: SketchPlaneRef::PlaneFeatureId { id: plane },
                    data: Default::default(),
                }),
            ),
        )
        .unwrap();

        for (x, y) in coords {
            let id = new_id();
            mutate::add_sketch_point(&mut store, sketch, SketchPoint::new(id, x, y)).unwrap();
        }

        let json = save_document(store.snapshot());
        let loaded = load_document(&json).unwrap();
        prop_assert_eq!(&loaded, store.snapshot());
        prop_assert!(validate_invariants(&loaded).is_empty());
    }
}
