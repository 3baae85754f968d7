use std::sync::RwLock;

use di::ServiceCollection;

/// A module contributes services to the launcher's service collection
/// before the application factory runs.
///
/// The launcher registers its own services (configuration, logging) the
/// same way; applications add theirs by passing modules to the builder.
///
/// # Example
/// ```
/// use std::sync::RwLock;
///
/// use atrium_bootstrap::module::Module;
/// use di::{Ref, ServiceCollection, singleton_as_self};
///
/// struct Clock;
/// struct ClockModule;
///
/// impl Module for ClockModule {
///     fn configure(&self, binder: &RwLock<ServiceCollection>) {
///         let clock = Ref::new(Clock);
///         if let Ok(mut services) = binder.write() {
///             services.add(singleton_as_self::<Clock>().from(move |_| clock.clone()));
///         }
///     }
/// }
/// ```
pub trait Module {
    /// Adds services to the collection. The binder is shared, so modules
    /// must not hold the write lock beyond their own registrations.
    fn configure(&self, binder: &RwLock<ServiceCollection>);
}
