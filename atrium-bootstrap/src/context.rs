use crate::app::Application;

/// Scoped application context.
///
/// Some collaborator operations, schema creation among them, are only valid
/// while a context is live. Those operations take `&AppContext`, so holding
/// one is enforced at compile time, and the context is released on drop on
/// every exit path, including errors and panics.
pub struct AppContext<'app> {
    app: &'app Application,
}

impl<'app> AppContext<'app> {
    pub(crate) fn new(app: &'app Application) -> Self {
        app.context_entered();
        Self { app }
    }

    pub fn app(&self) -> &Application {
        self.app
    }
}

impl Drop for AppContext<'_> {
    fn drop(&mut self) {
        self.app.context_exited();
    }
}
