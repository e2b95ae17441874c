//! Lazy, zero-argument wrappers around container lookups.
//!
//! [`Container::instance`] wraps "resolve this", [`Container::callback`]
//! wraps "resolve this and call a method on it". Neither touches the target
//! until the wrapper is called. Wrappers whose result is stable (a singleton
//! target, or a static method) are cached and handed out again.
//!
//! A wrapper only holds a weak handle on its container: calling it after
//! the container is gone fails with [`Error::ContainerDropped`].

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::trace;

use crate::builder::{Argument, guard_fatal};
use crate::container::{Container, Inner};
use crate::error::{Error, Result};
use crate::id::Identifier;
use crate::value::{Instance, Value};

type CallFn = Arc<dyn Fn(&Container) -> Result<Value> + Send + Sync>;

/// A deferred call into the container.
#[derive(Clone)]
pub struct Invokable {
    container: Weak<Inner>,
    target: CallFn,
    label: Arc<str>,
}

impl Invokable {
    pub(crate) fn new(container: &Container, label: impl Into<Arc<str>>, target: CallFn) -> Self {
        Self {
            container: container.downgrade(),
            target,
            label: label.into(),
        }
    }

    /// Runs the wrapped lookup.
    pub fn call(&self) -> Result<Value> {
        let container = Container::upgrade(&self.container).ok_or(Error::ContainerDropped)?;
        trace!(callback = %self.label, "Invoking callback");
        (self.target)(&container)
    }

    /// What the wrapper calls, e.g. `Mailer::send`.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Reference equality: both handles are the same wrapper.
    #[inline]
    pub fn same(&self, other: &Invokable) -> bool {
        Arc::ptr_eq(&self.target, &other.target)
    }
}

impl fmt::Debug for Invokable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invokable({})", self.label)
    }
}

/// What [`Container::callback`] calls a method on.
#[derive(Debug, Clone)]
pub enum CallbackTarget {
    /// Resolved through the container when the callback runs.
    Entry(Identifier),
    /// An object the caller already holds.
    Object(Instance),
}

impl From<&str> for CallbackTarget {
    fn from(id: &str) -> Self {
        CallbackTarget::Entry(id.into())
    }
}

impl From<String> for CallbackTarget {
    fn from(id: String) -> Self {
        CallbackTarget::Entry(id.into())
    }
}

impl From<Identifier> for CallbackTarget {
    fn from(id: Identifier) -> Self {
        CallbackTarget::Entry(id)
    }
}

impl From<Instance> for CallbackTarget {
    fn from(instance: Instance) -> Self {
        CallbackTarget::Object(instance)
    }
}

impl Container {
    /// A wrapper that resolves `id` when called.
    ///
    /// With build arguments or after-build methods, every call builds a
    /// fresh instance of the class `id` is bound to (or of `id` itself when
    /// unbound) with them. Given after-build methods replace the bound
    /// class's own.
    pub fn instance(
        &self,
        id: impl Into<Identifier>,
        arguments: Vec<Argument>,
        after_build: Vec<String>,
    ) -> Result<Invokable> {
        let id = id.into();

        if arguments.is_empty() && after_build.is_empty() {
            let cache_key = format!("instance:{id}");
            if let Some(cached) = self.cached_callback(&cache_key) {
                return Ok(cached);
            }

            let target = id.clone();
            let invokable = Invokable::new(self, id.as_str(), Arc::new(move |c: &Container| c.get(&target)));
            if self.is_singleton(&id) {
                self.cache_callback(cache_key, &invokable);
            }
            return Ok(invokable);
        }

        let mut builder = self.class_builder(&id)?.with_arguments(arguments);
        if !after_build.is_empty() {
            builder = builder.with_after_build(after_build);
        }
        let target = id.clone();
        Ok(Invokable::new(
            self,
            id.as_str(),
            Arc::new(move |c: &Container| c.build_top(&builder, &target)),
        ))
    }

    /// A wrapper that calls `method` on `target` when called.
    ///
    /// `method` may be a static method of the class named by `target`; the
    /// class is then never instantiated.
    pub fn callback(&self, target: impl Into<CallbackTarget>, method: &str) -> Result<Invokable> {
        let target = target.into();
        if method.is_empty() {
            return Err(Error::InvalidCallback {
                target: describe_target(&target),
                reason: "the method name is empty".into(),
            });
        }
        let method = method.to_string();

        match target {
            CallbackTarget::Entry(id) if id.is_empty() => Err(Error::InvalidCallback {
                target: "''".into(),
                reason: "the target identifier is empty".into(),
            }),
            CallbackTarget::Entry(id) => {
                let label = format!("{id}::{method}");

                if let Some(static_method) = self
                    .describe_class(&id)
                    .and_then(|class| class.static_method(&method).cloned())
                {
                    let cache_key = format!("static:{label}");
                    if let Some(cached) = self.cached_callback(&cache_key) {
                        return Ok(cached);
                    }
                    let context = format!("{label}()");
                    let invokable = Invokable::new(
                        self,
                        label,
                        Arc::new(move |c: &Container| guard_fatal(|| context.clone(), || static_method(c))),
                    );
                    self.cache_callback(cache_key, &invokable);
                    return Ok(invokable);
                }

                let cache_key = format!("call:{label}");
                if let Some(cached) = self.cached_callback(&cache_key) {
                    return Ok(cached);
                }
                let singleton = self.is_singleton(&id);
                let invokable = Invokable::new(
                    self,
                    label,
                    Arc::new(move |c: &Container| {
                        let value = c.get(&id)?;
                        c.call_method(&value, &method)
                    }),
                );
                if singleton {
                    self.cache_callback(cache_key, &invokable);
                }
                Ok(invokable)
            }
            CallbackTarget::Object(instance) => {
                let class = self.describe_class(instance.class());
                if class.as_ref().is_some_and(|class| class.method(&method).is_none()) {
                    return Err(Error::InvalidCallback {
                        target: instance.class().quoted(),
                        reason: format!("it has no method '{method}'"),
                    });
                }

                let label = format!("{}::{method}", instance.class());
                let value = Value::Object(instance);
                Ok(Invokable::new(
                    self,
                    label,
                    Arc::new(move |c: &Container| c.call_method(&value, &method)),
                ))
            }
        }
    }

    /// Calls a method declared on the class of `value`.
    pub fn call_method(&self, value: &Value, method: &str) -> Result<Value> {
        let instance = value.as_object().ok_or_else(|| Error::InvalidCallback {
            target: value.type_name(),
            reason: format!("cannot call '{method}' on a non-object"),
        })?;

        let class = self.describe_class(instance.class());
        let function = class
            .as_ref()
            .and_then(|class| class.method(method))
            .ok_or_else(|| Error::UnknownMethod {
                class: instance.class().clone(),
                method: method.to_string(),
            })?;

        guard_fatal(|| format!("{}::{method}()", instance.class()), || function(instance))
    }
}

fn describe_target(target: &CallbackTarget) -> String {
    match target {
        CallbackTarget::Entry(id) => id.quoted(),
        CallbackTarget::Object(instance) => instance.class().quoted(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::builder::Implementation;
    use crate::fixtures::{self, Counter, Mailer, Notifier};

    #[test]
    fn instance_wrapper_is_lazy() {
        let container = fixtures::container();
        let calls = Arc::new(AtomicUsize::new(0));
        container
            .bind("clock.tick", {
                let calls = calls.clone();
                Implementation::factory(move |_| Ok(Value::from(calls.fetch_add(1, Ordering::SeqCst) as i64)))
            })
            .unwrap();

        let wrapper = container.instance("clock.tick", Vec::new(), Vec::new()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        wrapper.call().unwrap();
        wrapper.call().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn singleton_instance_wrapper_is_cached() {
        let container = fixtures::container();
        container.singleton("Counter", "Counter").unwrap();

        let a = container.instance("Counter", Vec::new(), Vec::new()).unwrap();
        let b = container.instance("Counter", Vec::new(), Vec::new()).unwrap();
        assert!(a.same(&b));
        assert!(a.call().unwrap().same(&b.call().unwrap()));
    }

    #[test]
    fn transient_instance_wrapper_is_not_cached() {
        let container = fixtures::container();

        let a = container.instance("Counter", Vec::new(), Vec::new()).unwrap();
        let b = container.instance("Counter", Vec::new(), Vec::new()).unwrap();
        assert!(!a.same(&b));
    }

    #[test]
    fn instance_wrapper_with_arguments_builds_fresh() {
        let container = fixtures::container();
        let wrapper = container
            .instance("Mailer", vec![Argument::reference("NullLogger"), Argument::value("mx.local")], Vec::new())
            .unwrap();

        let a = wrapper.call().unwrap();
        let b = wrapper.call().unwrap();
        assert!(!a.same(&b));
        assert_eq!(a.downcast::<Mailer>().unwrap().host, "mx.local");
    }

    #[test]
    fn instance_wrapper_with_arguments_uses_the_bound_class() {
        let container = fixtures::container();
        container.bind("Notifier", "RetryNotifier").unwrap();

        let wrapper = container
            .instance("Notifier", vec![Argument::reference("BaseNotifier")], Vec::new())
            .unwrap();
        let notifier = wrapper.call().unwrap().downcast::<dyn Notifier>().unwrap();
        assert_eq!(notifier.describe(), "retry(base)");
    }

    #[test]
    fn instance_wrapper_keeps_bound_hooks_unless_given_its_own() {
        let container = fixtures::container();
        container.bind_with("counter", "Counter", vec!["init".into()]).unwrap();

        let bound = container.instance("counter", vec![Argument::value(0)], Vec::new()).unwrap();
        let own = container.instance("counter", Vec::new(), vec!["init".into(), "increment".into()]).unwrap();

        let count = |value: Value| value.downcast::<Counter>().unwrap().count.load(Ordering::SeqCst);
        assert_eq!(count(bound.call().unwrap()), 1);
        assert_eq!(count(own.call().unwrap()), 2);
    }

    #[test]
    fn callback_calls_method_on_resolved_target() {
        let container = fixtures::container();
        container.singleton("Counter", "Counter").unwrap();

        let callback = container.callback("Counter", "value").unwrap();
        assert_eq!(callback.label(), "Counter::value");
        assert!(callback.call().unwrap().as_int().is_some());
        assert!(callback.same(&container.callback("Counter", "value").unwrap()));
    }

    #[test]
    fn static_callback_is_cached() {
        let container = fixtures::container();

        let a = container.callback("Clock", "now").unwrap();
        let b = container.callback("Clock", "now").unwrap();
        assert!(a.same(&b));
        assert_eq!(a.call().unwrap().as_str(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn callback_on_object() {
        let container = fixtures::container();
        let counter = container.get("Counter").unwrap();
        let instance = counter.as_object().unwrap().clone();

        let callback = container.callback(instance.clone(), "value").unwrap();
        let direct = container.call_method(&counter, "value").unwrap();
        assert_eq!(callback.call().unwrap().as_int(), direct.as_int());

        let err = container.callback(instance, "explode").unwrap_err();
        assert!(matches!(err, Error::InvalidCallback { .. }));
    }

    #[test]
    fn malformed_callbacks_are_rejected() {
        let container = fixtures::container();

        assert!(matches!(container.callback("", "value"), Err(Error::InvalidCallback { .. })));
        assert!(matches!(container.callback("Counter", ""), Err(Error::InvalidCallback { .. })));
    }

    #[test]
    fn unknown_method_fails_when_called() {
        let container = fixtures::container();
        let callback = container.callback("Counter", "explode").unwrap();

        let err = callback.call().unwrap_err();
        assert!(matches!(err, Error::UnknownMethod { .. }));
    }

    #[test]
    fn wrapper_outliving_container_fails() {
        let container = fixtures::container();
        let wrapper = container.instance("Counter", Vec::new(), Vec::new()).unwrap();
        drop(container);

        assert!(matches!(wrapper.call(), Err(Error::ContainerDropped)));
    }
}
