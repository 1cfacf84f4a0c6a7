pub(crate) mod composite;
/// Render targets, descriptors and backing stores.
pub mod target;
/// Descriptor-keyed render target pool.
pub mod target_cache;
