//! Class catalog shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::container::Container;
use crate::descriptor::{ClassDescriptor, Visibility};
use crate::error::Result;
use crate::parameter::ParameterDescriptor;
use crate::provider::ServiceProvider;
use crate::value::Value;

// ── Loggers ──

pub trait Logger: Send + Sync {
    fn name(&self) -> &str;
}

#[derive(Default)]
pub struct FileLogger;

impl Logger for FileLogger {
    fn name(&self) -> &str {
        "file"
    }
}

#[derive(Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn name(&self) -> &str {
        "null"
    }
}

// ── Mail ──

pub struct Mailer {
    pub logger: Arc<dyn Logger>,
    pub host: String,
}

pub struct Newsletter {
    pub mailer: Arc<Mailer>,
}

/// Needs a scalar nobody can guess.
pub struct Connection {
    pub dsn: String,
}

// ── Notifier decorators ──

pub trait Notifier: Send + Sync {
    fn describe(&self) -> String;
}

#[derive(Default)]
pub struct BaseNotifier;

impl Notifier for BaseNotifier {
    fn describe(&self) -> String {
        "base".to_string()
    }
}

pub struct Decorator {
    label: &'static str,
    pub inner: Arc<dyn Notifier>,
}

impl Notifier for Decorator {
    fn describe(&self) -> String {
        format!("{}({})", self.label, self.inner.describe())
    }
}

// ── Misc ──

#[derive(Default)]
pub struct Counter {
    pub count: AtomicI64,
}

#[derive(Default)]
pub struct Secret;

pub struct Chicken;
pub struct Egg;

/// Holds an unknown dependency.
pub struct Outer;

#[derive(Default)]
pub struct Clock;

#[derive(Default)]
pub struct AppServiceProvider;

impl ServiceProvider for AppServiceProvider {
    fn register(&self, container: &Container) -> Result<()> {
        container.singleton("app.name", crate::builder::Implementation::value("autowire"))
    }
}

fn decorator(class: &'static str, label: &'static str) -> ClassDescriptor {
    ClassDescriptor::class::<Decorator>(class)
        .needs("inner", "Notifier")
        .constructor(move |args| {
            Ok(Decorator {
                label,
                inner: args.object::<dyn Notifier>(0)?,
            })
        })
        .implements::<dyn Notifier>("Notifier", |this| this as Arc<dyn Notifier>)
        .into_descriptor()
}

/// Every fixture class.
pub fn classes() -> Vec<ClassDescriptor> {
    vec![
        ClassDescriptor::interface("Logger"),
        ClassDescriptor::class::<FileLogger>("FileLogger")
            .implements::<dyn Logger>("Logger", |this| this as Arc<dyn Logger>)
            .default_constructor()
            .into(),
        ClassDescriptor::class::<NullLogger>("NullLogger")
            .implements::<dyn Logger>("Logger", |this| this as Arc<dyn Logger>)
            .default_constructor()
            .into(),
        ClassDescriptor::class::<Mailer>("Mailer")
            .needs("logger", "Logger")
            .parameter(ParameterDescriptor::typed("host", "string").with_default("localhost"))
            .constructor(|args| {
                Ok(Mailer {
                    logger: args.object::<dyn Logger>(0)?,
                    host: args.string(1)?,
                })
            })
            .into(),
        ClassDescriptor::class::<Newsletter>("Newsletter")
            .needs("mailer", "Mailer")
            .constructor(|args| {
                Ok(Newsletter {
                    mailer: args.object::<Mailer>(0)?,
                })
            })
            .into(),
        ClassDescriptor::class::<Connection>("Connection")
            .parameter(ParameterDescriptor::typed("dsn", "string"))
            .constructor(|args| Ok(Connection { dsn: args.string(0)? }))
            .into(),
        ClassDescriptor::interface("Notifier"),
        ClassDescriptor::class::<BaseNotifier>("BaseNotifier")
            .implements::<dyn Notifier>("Notifier", |this| this as Arc<dyn Notifier>)
            .default_constructor()
            .into(),
        decorator("RetryNotifier", "retry"),
        decorator("LoggingNotifier", "logging"),
        decorator("MetricsNotifier", "metrics"),
        ClassDescriptor::abstract_class("BaseRepository"),
        ClassDescriptor::class::<Outer>("Outer")
            .needs("missing", "Missing")
            .constructor(|_| Ok(Outer))
            .into(),
        ClassDescriptor::class::<Counter>("Counter")
            .default_constructor()
            .after_build("init", |this| {
                *this.count.get_mut() = 1;
                Ok(())
            })
            .method("value", |this| Ok(Value::from(this.count.load(Ordering::SeqCst))))
            .method("increment", |this| {
                Ok(Value::from(this.count.fetch_add(1, Ordering::SeqCst) + 1))
            })
            .into(),
        ClassDescriptor::class::<Secret>("Secret")
            .default_constructor()
            .visibility(Visibility::Private)
            .into(),
        ClassDescriptor::class::<Chicken>("Chicken")
            .needs("egg", "Egg")
            .constructor(|_| Ok(Chicken))
            .into(),
        ClassDescriptor::class::<Egg>("Egg")
            .needs("chicken", "Chicken")
            .constructor(|_| Ok(Egg))
            .into(),
        ClassDescriptor::class::<Clock>("Clock")
            .default_constructor()
            .static_method("now", |_| Ok(Value::from("2024-01-01T00:00:00Z")))
            .into(),
        ClassDescriptor::class::<AppServiceProvider>("AppServiceProvider")
            .implements::<dyn ServiceProvider>("ServiceProvider", |this| this as Arc<dyn ServiceProvider>)
            .default_constructor()
            .into(),
    ]
}

/// A container knowing every fixture class, with `Logger` bound to
/// `FileLogger`.
pub fn container() -> Container {
    let container = classes()
        .into_iter()
        .fold(Container::builder(), |builder, class| builder.define(class))
        .build();

    if let Err(err) = container.bind("Logger", "FileLogger") {
        panic!("fixture binding failed: {err}");
    }
    container
}
