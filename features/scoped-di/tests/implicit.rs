mod common;

use std::convert::Infallible;

use futures::executor::block_on;
use scoped_di::{
    Context, Dependency, Factory, ImplicitFactories, ImplicitOrigin, InjectError, Invokable,
    InvokableBuilder, TypeInfo,
};

#[test]
fn bootstrap_values_are_visible_from_every_scope() {
    let root = Context::root_builder()
        .add_bootstrap("port", 8080_u16)
        .build();
    let port = Dependency::implicit::<u16>("port");

    block_on(async {
        assert_eq!(*root.resolve::<u16>(&port).await.unwrap(), 8080);

        let app = root.enter_next_scope(ImplicitFactories::new()).unwrap();
        let handler = app.context().enter_next_scope(ImplicitFactories::new()).unwrap();
        assert_eq!(*handler.context().resolve::<u16>(&port).await.unwrap(), 8080);
    });
}

#[test]
fn implicit_factory_shadows_bootstrap_and_outer_registries() {
    let outer = Factory::builder("outer").value(|_| Ok::<_, Infallible>(String::from("outer")));
    let inner = Factory::builder("inner").value(|_| Ok::<_, Infallible>(String::from("inner")));
    let target = InvokableBuilder::new("target")
        .implicit::<String>("source")
        .call(|args| args.get::<String>("source").map(|source| source.to_string()));

    block_on(async {
        let root = Context::root_builder()
            .add_bootstrap("source", String::from("bootstrap"))
            .build();
        let app = root
            .enter_next_scope(ImplicitFactories::new().with("source", outer))
            .unwrap();

        let handler = app.context().enter_next_scope(ImplicitFactories::new()).unwrap();
        assert_eq!(handler.context().invoke(&target).await.unwrap().unwrap(), "outer");

        let nested = handler
            .context()
            .enter_next_scope(ImplicitFactories::new().with("source", inner))
            .unwrap();
        assert_eq!(nested.context().invoke(&target).await.unwrap().unwrap(), "inner");

        // Siblings don't see each other's registries
        assert_eq!(handler.context().invoke(&target).await.unwrap().unwrap(), "outer");
    });
}

#[test]
fn app_scoped_implicit_factories_live_in_the_app_scope() {
    let pool = Factory::builder("pool")
        .app_scoped()
        .value(|_| Ok::<_, Infallible>(vec![String::from("conn")]));
    let dependency = Dependency::implicit::<Vec<String>>("pool");

    block_on(async {
        let app = Context::root()
            .enter_next_scope(ImplicitFactories::new().with("pool", pool))
            .unwrap();
        let first = app.context().enter_next_scope(ImplicitFactories::new()).unwrap();
        let second = app.context().enter_next_scope(ImplicitFactories::new()).unwrap();

        let a = first.context().create(&dependency).await.unwrap();
        let b = second.context().create(&dependency).await.unwrap();

        assert!(a.same_as(&b));
        assert_eq!(app.context().cached_count(), 1);
        assert_eq!(first.context().cached_count(), 0);
    });
}

#[test]
fn unregistered_names_are_unbound() {
    let target: Invokable<()> = InvokableBuilder::new("target")
        .implicit::<String>("missing")
        .call(|_| panic!("target must not run"));

    block_on(async {
        let app = Context::root().enter_next_scope(ImplicitFactories::new()).unwrap();
        let error = app.context().invoke(&target).await.unwrap_err();

        assert!(matches!(error, InjectError::Unbound { name } if name == "missing"));
    });
}

#[test]
fn bootstrap_value_of_wrong_type_is_rejected() {
    let root = Context::root_builder()
        .add_bootstrap("port", String::from("8080"))
        .build();

    block_on(async {
        let error = root
            .create(&Dependency::implicit::<u16>("port"))
            .await
            .unwrap_err();

        let InjectError::TypeMismatch {
            name,
            origin,
            expected,
            actual,
        } = error
        else {
            panic!("expected a type mismatch");
        };
        assert_eq!(name, "port");
        assert_eq!(origin, ImplicitOrigin::Bootstrap);
        assert_eq!(expected, TypeInfo::of::<u16>());
        assert_eq!(actual, std::any::type_name::<String>());
    });
}

#[test]
fn implicit_factory_of_wrong_type_is_rejected() {
    let timeout = Factory::builder("timeout").value(|_| Ok::<_, Infallible>(30_i64));

    block_on(async {
        let app = Context::root()
            .enter_next_scope(ImplicitFactories::new().with("timeout", timeout))
            .unwrap();
        let handler = app.context().enter_next_scope(ImplicitFactories::new()).unwrap();

        let error = handler
            .context()
            .create(&Dependency::implicit::<u64>("timeout"))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            InjectError::TypeMismatch {
                origin: ImplicitOrigin::ImplicitFactory,
                ..
            }
        ));
    });
}
