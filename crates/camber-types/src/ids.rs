use uuid::Uuid;

/// Allocate a fresh id for a persistent entity.
///
/// Every feature, sketch point, sketch entity, and constraint gets one of
/// these; the key an entity lives under in any map must equal its `id` field.
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}
