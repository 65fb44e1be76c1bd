use crate::registry::scope::Registry;

/// **AUTOWIRE CAPABILITY**
///
/// **PURPOSE**: Targets declare their own dependencies instead of being
/// introspected at runtime.
/// **CONTRACT**: Best-effort. Implementations call [`Registry::inject`] (or
/// [`Registry::get`]) per field and leave unresolvable fields untouched.
///
/// ```rust
/// use scopewire::registry::{Autowire, Registry};
/// use std::sync::Arc;
///
/// struct Mailer;
///
/// #[derive(Default)]
/// struct SignupService {
///     mailer: Option<Arc<Mailer>>,
/// }
///
/// impl Autowire for SignupService {
///     fn autowire(&mut self, registry: &Registry) {
///         registry.inject(&mut self.mailer);
///     }
/// }
///
/// let registry = Registry::new();
/// registry.bind_value(Mailer);
///
/// let mut service = SignupService::default();
/// registry.autowire(&mut service);
/// assert!(service.mailer.is_some());
/// ```
pub trait Autowire {
    fn autowire(&mut self, registry: &Registry);
}

impl<A: Autowire + ?Sized> Autowire for Box<A> {
    fn autowire(&mut self, registry: &Registry) {
        (**self).autowire(registry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Clock(u64);
    struct Metrics;

    #[derive(Default)]
    struct Report {
        clock: Option<Arc<Clock>>,
        metrics: Option<Arc<Metrics>>,
        title: String,
    }

    impl Autowire for Report {
        fn autowire(&mut self, registry: &Registry) {
            registry.inject(&mut self.clock);
            registry.inject(&mut self.metrics);
        }
    }

    #[test]
    fn test_unresolvable_fields_left_untouched() {
        let registry = Registry::new();
        registry.bind_value(Clock(42));

        let previous = Arc::new(Metrics);
        let mut report = Report {
            metrics: Some(previous.clone()),
            title: "daily".into(),
            ..Report::default()
        };
        registry.autowire(&mut report);

        assert_eq!(report.clock.as_ref().map(|c| c.0), Some(42));
        assert!(Arc::ptr_eq(report.metrics.as_ref().unwrap(), &previous));
        assert_eq!(report.title, "daily");
    }

    #[test]
    fn test_boxed_target() {
        let registry = Registry::new();
        registry.bind_value(Clock(1));
        let mut boxed: Box<Report> = Box::default();
        registry.autowire(&mut boxed);
        assert!(boxed.clock.is_some());
    }
}
