//! Controller binding: construct controllers and register their routes.

use crate::dispatcher::Dispatcher;
use crate::registry::{BindError, ControllerRegistration, ControllerRegistry, ProviderMap};
use crate::router::{RouteEntry, Router};
use std::sync::Arc;
use tracing::info;

/// Binds every registered controller at startup.
///
/// For each registry entry, in registration order: validate the declared
/// dependency keys against the provider map (fail fast: an unresolved
/// dependency aborts startup before anything is constructed), construct one
/// controller instance through its factory, then register every declared
/// route with the route table and the dispatcher. Registration order is
/// preserved across controllers and within each controller's route list; the
/// binder never reorders, so overlapping paths resolve to whichever route
/// was registered first.
pub struct ControllerBinder<'a> {
    router: &'a mut Router,
    dispatcher: &'a mut Dispatcher,
    providers: &'a ProviderMap,
}

impl<'a> ControllerBinder<'a> {
    pub fn new(
        router: &'a mut Router,
        dispatcher: &'a mut Dispatcher,
        providers: &'a ProviderMap,
    ) -> Self {
        Self {
            router,
            dispatcher,
            providers,
        }
    }

    /// Bind every controller in the registry.
    ///
    /// # Safety
    ///
    /// Spawns one handler coroutine per route via
    /// [`Dispatcher::register_route`]; the caller must ensure the `may`
    /// runtime is initialized and that binding happens during startup.
    pub unsafe fn bind_all(&mut self, registry: &ControllerRegistry) -> Result<(), BindError> {
        for registration in registry.entries() {
            // SAFETY: same contract as bind_all; forwarded to register_route.
            unsafe {
                self.bind_one(registration)?;
            }
        }
        self.router.log_routes();
        Ok(())
    }

    unsafe fn bind_one(&mut self, registration: &ControllerRegistration) -> Result<(), BindError> {
        let descriptor = &registration.descriptor;

        for key in &descriptor.dependencies {
            if !self.providers.contains(key) {
                return Err(BindError::UnresolvedDependency {
                    controller: descriptor.name.clone(),
                    key: key.clone(),
                });
            }
        }

        let controller =
            (registration.factory)(self.providers).map_err(|cause| BindError::Construction {
                controller: descriptor.name.clone(),
                cause,
            })?;

        for route in &descriptor.routes {
            let entry = Arc::new(RouteEntry::bind(
                route,
                &descriptor.name,
                &descriptor.route_prefix,
            ));
            // SAFETY: forwarded caller contract; startup-time, may runtime up.
            unsafe {
                self.dispatcher
                    .register_route(&entry, Arc::clone(&controller));
            }
            self.router.add_route(entry);
        }

        info!(
            controller = %descriptor.name,
            route_prefix = %descriptor.route_prefix,
            routes = descriptor.routes.len(),
            "Controller bound"
        );
        Ok(())
    }
}
