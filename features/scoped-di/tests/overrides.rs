mod common;

use std::convert::Infallible;

use common::{sync_tracked, Calls, Connection, Recorder};
use futures::executor::block_on;
use scoped_di::{
    Context, Dependency, Factory, ImplicitFactories, Invokable, InvokableBuilder,
};

fn greeter() -> (Factory, Invokable<String>) {
    let greeting = Factory::builder("greeting")
        .app_scoped()
        .value(|_| Ok::<_, Infallible>(String::from("hello from production")));
    let app = InvokableBuilder::new("app")
        .explicit("greeting", &greeting)
        .call(|args| {
            args.get::<String>("greeting")
                .map(|greeting| greeting.to_string())
                .unwrap_or_default()
        });
    (greeting, app)
}

async fn run(root: Context, target: &Invokable<String>) -> String {
    let app = root.enter_next_scope(ImplicitFactories::new()).unwrap();
    let handler = app.context().enter_next_scope(ImplicitFactories::new()).unwrap();
    let result = handler.context().invoke(target).await.unwrap();
    handler.close().await.unwrap();
    app.close().await.unwrap();
    result
}

#[test]
fn override_replaces_the_real_factory() {
    let (greeting, app) = greeter();
    let mock = Factory::builder("mock_greeting")
        .app_scoped()
        .value(|_| Ok::<_, Infallible>(String::from("hello from a test")));

    block_on(async {
        assert_eq!(run(Context::root(), &app).await, "hello from production");

        let root = Context::root_builder().add_override(&greeting, mock).build();
        assert_eq!(run(root, &app).await, "hello from a test");
    });
}

#[test]
fn override_receives_its_own_dependencies() {
    let (greeting, app) = greeter();
    let name = Factory::builder("name")
        .app_scoped()
        .value(|_| Ok::<_, Infallible>(String::from("tester")));
    let mock = Factory::builder("mock_greeting")
        .app_scoped()
        .implicit::<String>("salutation")
        .explicit("name", &name)
        .value(|args| {
            let salutation = args.get::<String>("salutation")?;
            let name = args.get::<String>("name")?;
            Ok::<_, scoped_di::InjectError>(format!("{salutation}, {name}"))
        });

    block_on(async {
        let root = Context::root_builder()
            .add_bootstrap("salutation", String::from("howdy"))
            .add_override(&greeting, mock)
            .build();
        assert_eq!(run(root, &app).await, "howdy, tester");
    });
}

#[test]
fn overridden_values_are_cached_under_the_original() {
    let calls = Calls::default();
    let real = Factory::builder("real").value(|_| Ok::<_, Infallible>(1_u32));
    let mock = {
        let calls = calls.clone();
        Factory::builder("mock").value(move |_| {
            calls.hit();
            Ok::<_, Infallible>(2_u32)
        })
    };

    block_on(async {
        let root = Context::root_builder().add_override(&real, mock.clone()).build();
        let app = root.enter_next_scope(ImplicitFactories::new()).unwrap();
        let handler = app.context().enter_next_scope(ImplicitFactories::new()).unwrap();

        let first = handler
            .context()
            .resolve::<u32>(&Dependency::explicit(&real))
            .await
            .unwrap();
        let second = handler
            .context()
            .resolve::<u32>(&Dependency::explicit(&real))
            .await
            .unwrap();
        // The replacement is a factory of its own when requested directly
        let direct = handler
            .context()
            .resolve::<u32>(&Dependency::explicit(&mock))
            .await
            .unwrap();

        assert_eq!((*first, *second, *direct), (2, 2, 2));
        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(calls.count(), 2);
    });
}

#[test]
fn implicit_factories_can_be_overridden() {
    let real = Factory::builder("clock").value(|_| Ok::<_, Infallible>(1_000_u64));
    let frozen = Factory::builder("frozen_clock").value(|_| Ok::<_, Infallible>(0_u64));
    let target = InvokableBuilder::new("target")
        .implicit::<u64>("clock")
        .call(|args| args.get::<u64>("clock").map(|now| *now));

    block_on(async {
        let root = Context::root_builder().add_override(&real, frozen).build();
        let app = root.enter_next_scope(ImplicitFactories::new()).unwrap();
        let handler = app
            .context()
            .enter_next_scope(ImplicitFactories::new().with("clock", real))
            .unwrap();

        let now = handler.context().invoke(&target).await.unwrap().unwrap();
        assert_eq!(now, 0);
    });
}

#[test]
fn override_may_change_the_shape() {
    let recorder = Recorder::default();
    let real = Factory::builder("db").value(|_| Ok::<_, Infallible>(Connection { name: "real" }));
    let managed = sync_tracked("fake", &recorder);

    block_on(async {
        let root = Context::root_builder().add_override(&real, managed).build();
        let app = root.enter_next_scope(ImplicitFactories::new()).unwrap();
        let handler = app.context().enter_next_scope(ImplicitFactories::new()).unwrap();

        let connection = handler
            .context()
            .resolve::<Connection>(&Dependency::explicit(&real))
            .await
            .unwrap();
        assert_eq!(connection.name, "fake");
        assert_eq!(handler.context().owned_resources(), 1);

        handler.close().await.unwrap();
    });

    assert_eq!(recorder.events(), ["enter fake", "exit fake"]);
}
