//! The resource manager the pool delegates creation and disposal to

use async_trait::async_trait;

/// Creates and disposes the resources a [`ResourcePool`](crate::ResourcePool) hands out.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use esox_resourcepool::ManageResource;
///
/// struct Connections;
///
/// #[async_trait]
/// impl ManageResource for Connections {
///     type Resource = String;
///     type Error = std::io::Error;
///
///     async fn create(&self) -> Result<String, std::io::Error> {
///         Ok("connection".to_string())
///     }
///
///     fn dispose(&self, _resource: String) {}
/// }
/// ```
#[async_trait]
pub trait ManageResource: Send + Sync + 'static {
    type Resource: Send + 'static;
    type Error: Send + 'static;

    /// Produce a new resource. A failure is returned to the caller of `get()` as is.
    async fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Release a resource for good. Called at most once per resource.
    fn dispose(&self, resource: Self::Resource);
}
