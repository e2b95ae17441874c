//! Basic example of the autowire container.

use std::sync::Arc;

use autowire::prelude::*;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

#[derive(Default)]
struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Database {
    dsn: String,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.dsn)
    }
}

struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

struct UserService {
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.repo.find_user(id)
    }
}

/// Binds the connection settings, but only once someone asks for them.
struct DatabaseProvider;

impl ServiceProvider for DatabaseProvider {
    fn register(&self, container: &Container) -> Result<()> {
        container.singleton("database.dsn", Implementation::value("postgres://localhost/myapp"))
    }

    fn is_deferred(&self) -> bool {
        true
    }

    fn provides(&self) -> Vec<Identifier> {
        vec!["database.dsn".into()]
    }
}

fn classes() -> Vec<ClassDescriptor> {
    vec![
        ClassDescriptor::interface("Logger"),
        ClassDescriptor::class::<ConsoleLogger>("ConsoleLogger")
            .implements::<dyn Logger>("Logger", |this| this as Arc<dyn Logger>)
            .default_constructor()
            .into(),
        ClassDescriptor::class::<Database>("Database")
            .parameter(ParameterDescriptor::typed("dsn", "string"))
            .needs("logger", "Logger")
            .constructor(|args| {
                Ok(Database {
                    dsn: args.string(0)?,
                    logger: args.object::<dyn Logger>(1)?,
                })
            })
            .into(),
        ClassDescriptor::class::<UserRepository>("UserRepository")
            .needs("db", "Database")
            .constructor(|args| Ok(UserRepository { db: args.object(0)? }))
            .into(),
        ClassDescriptor::class::<UserService>("UserService")
            .needs("repo", "UserRepository")
            .needs("logger", "Logger")
            .constructor(|args| {
                Ok(UserService {
                    repo: args.object(0)?,
                    logger: args.object::<dyn Logger>(1)?,
                })
            })
            .into(),
    ]
}

fn main() -> Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::fmt()
        .with_env_filter("autowire_container=debug")
        .init();

    // Build the container
    let container = classes()
        .into_iter()
        .fold(Container::builder(), |builder, class| builder.define(class))
        .build();

    // Logger: one shared instance
    container.singleton("Logger", "ConsoleLogger")?;
    // Database: one shared connection, its DSN comes from a deferred provider
    container.singleton_self("Database")?;
    container.when("Database").needs("$dsn").give(Implementation::factory(|c: &Container| {
        c.get("database.dsn")
    }))?;
    container.register_instance("DatabaseProvider", DatabaseProvider, &["db"])?;
    container.boot()?;

    container.validate()?;
    println!("Container built successfully!");
    println!("{container:?}");

    // UserService and UserRepository are never bound: both are autowired
    let service = container.resolve::<UserService>("UserService")?;
    println!("{}", service.get_user(42));

    let again = container.resolve::<UserService>("UserService")?;
    println!("{}", again.get_user(7));
    println!("Same database: {}", Arc::ptr_eq(&service.repo.db, &again.repo.db));

    // Errors carry the path that led to them
    container.unbind("Logger");
    if let Err(err) = container.get("UserService") {
        println!("{err}");
    }

    Ok(())
}
