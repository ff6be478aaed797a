//! Save-then-render cycles through the host hook surface.
//!
//! Each save and each render gets its own context, the way a host drives the
//! extension across separate requests of one worker process.

use std::sync::Arc;

use renderkey::application::extension::{RequestParamsExtension, SavedPage};
use renderkey::application::request::QueryParams;
use renderkey::cache::{DoublingEncoder, KeyEncoder, KeyEncoding, ParamRegistry, RegistryConfig};
use renderkey::domain::params::{Origin, PageId, PageIdentity, PageRef, ParameterSet};
use renderkey::infra::memory::MemoryParamsRepo;

const BASE_KEY: &str = "wiki:pcache:idhash:42-0!canonical";

fn extension_with(repo: Arc<MemoryParamsRepo>, config: RegistryConfig) -> RequestParamsExtension {
    RequestParamsExtension::new(Arc::new(ParamRegistry::new(config, repo)))
}

fn title(name: &str) -> PageIdentity {
    PageIdentity::new(name).expect("valid title")
}

/// Expand `names` as `{{#requestparams}}` during a save, then run the save hook.
async fn save_page(ext: &RequestParamsExtension, page: &PageRef, names: &[&str]) {
    let mut ctx = ext.begin(Arc::new(QueryParams::new()));
    let unsaved = PageRef::unsaved(page.identity.clone());
    ext.expand(&mut ctx, &unsaved, "requestparams", names)
        .await
        .expect("declaration expands");
    let saved = SavedPage {
        page: page.clone(),
        changed: true,
    };
    assert!(ext.page_saved(&ctx, &saved).await.expect("save persists"));
}

/// Render `page` for `query`, reading `reads`, and return the render key.
async fn render_page(
    ext: &RequestParamsExtension,
    page: &PageRef,
    query: &str,
    reads: &[&str],
) -> (String, bool, Vec<String>) {
    let mut ctx = ext.begin(Arc::new(QueryParams::from_query(query)));
    let mut values = Vec::new();
    for name in reads {
        let value = ext
            .expand(&mut ctx, page, "request", &[*name])
            .await
            .expect("request expands");
        values.push(value);
    }
    let mut key = BASE_KEY.to_string();
    ext.render_key(&mut ctx, page, &mut key).await;
    (key, ctx.caching_disabled(), values)
}

#[tokio::test]
async fn saved_declarations_key_later_renders() {
    let repo = Arc::new(MemoryParamsRepo::new());
    let ext = extension_with(repo.clone(), RegistryConfig::default());
    let bar = PageRef::saved(title("Bar"), PageId::new(42).unwrap());

    save_page(&ext, &bar, &["y", "x"]).await;
    let expected: ParameterSet = ["x", "y"].into_iter().collect();
    assert_eq!(repo.stored(PageId::new(42).unwrap()), Some(expected));

    let (key, uncacheable, values) = render_page(&ext, &bar, "x=1&y=2", &["x", "y"]).await;
    assert_eq!(key, format!("{BASE_KEY}|1|2|"));
    assert!(!uncacheable);
    assert_eq!(values, vec!["1".to_string(), "2".to_string()]);
}

#[tokio::test]
async fn different_values_produce_different_keys() {
    let repo = Arc::new(MemoryParamsRepo::new());
    let ext = extension_with(repo, RegistryConfig::default());
    let foo = PageRef::saved(title("Foo"), PageId::new(7).unwrap());
    save_page(&ext, &foo, &["lang"]).await;

    let (en, _, _) = render_page(&ext, &foo, "lang=en", &[]).await;
    let (de, _, _) = render_page(&ext, &foo, "lang=de", &[]).await;
    let (piped, _, _) = render_page(&ext, &foo, "lang=a%7Cb", &[]).await;

    assert_eq!(en, format!("{BASE_KEY}|en|"));
    assert_eq!(de, format!("{BASE_KEY}|de|"));
    assert_eq!(piped, format!("{BASE_KEY}|a||b|"));

    let suffix = piped.strip_prefix(BASE_KEY).unwrap();
    assert_eq!(
        DoublingEncoder::default().decode(suffix, 1),
        Some(vec!["a|b".to_string()])
    );
}

#[tokio::test]
async fn undeclared_reads_make_render_uncacheable() {
    let repo = Arc::new(MemoryParamsRepo::new());
    let ext = extension_with(repo, RegistryConfig::default());
    let page = PageRef::saved(title("Loose"), PageId::new(3).unwrap());

    let (key, uncacheable, values) = render_page(&ext, &page, "z=zed", &["z"]).await;
    assert_eq!(key, BASE_KEY);
    assert!(uncacheable);
    assert_eq!(values, vec!["zed".to_string()]);

    let (_, uncacheable, values) = render_page(&ext, &page, "", &["z"]).await;
    assert!(uncacheable);
    assert_eq!(values, vec![String::new()]);
}

#[tokio::test]
async fn resave_without_directive_keeps_declarations() {
    let repo = Arc::new(MemoryParamsRepo::new());
    let ext = extension_with(repo.clone(), RegistryConfig::default());
    let foo = PageRef::saved(title("Foo"), PageId::new(5).unwrap());
    save_page(&ext, &foo, &["lang"]).await;

    let ctx = ext.begin(Arc::new(QueryParams::new()));
    let saved = SavedPage {
        page: foo.clone(),
        changed: true,
    };
    assert!(!ext.page_saved(&ctx, &saved).await.unwrap());

    let expected: ParameterSet = ["lang"].into_iter().collect();
    assert_eq!(repo.stored(PageId::new(5).unwrap()), Some(expected));
}

#[tokio::test]
async fn resave_with_empty_directive_clears_declarations() {
    let repo = Arc::new(MemoryParamsRepo::new());
    let ext = extension_with(repo.clone(), RegistryConfig::default());
    let foo = PageRef::saved(title("Foo"), PageId::new(6).unwrap());
    save_page(&ext, &foo, &["lang"]).await;
    save_page(&ext, &foo, &[]).await;

    assert_eq!(repo.stored(PageId::new(6).unwrap()), None);
    let (key, uncacheable, _) = render_page(&ext, &foo, "lang=en", &["lang"]).await;
    assert_eq!(key, BASE_KEY);
    assert!(uncacheable);
}

#[tokio::test]
async fn saving_process_sees_its_own_declarations() {
    let repo = Arc::new(MemoryParamsRepo::new());
    let ext = extension_with(repo.clone(), RegistryConfig::default());
    let foo = PageRef::saved(title("Foo"), PageId::new(8).unwrap());

    // Load (and cache) the empty set before the page declares anything.
    let (_, _, _) = render_page(&ext, &foo, "", &[]).await;
    save_page(&ext, &foo, &["lang"]).await;

    let ctx = ext.begin(Arc::new(QueryParams::new()));
    let entry = ctx.lookup(&foo).await.unwrap();
    assert_eq!(entry.origin, Origin::Cached);
    assert!(entry.params.contains("lang"));
    assert_eq!(repo.load_calls(), 1);
}

#[tokio::test]
async fn other_process_keeps_stale_cached_set() {
    let repo = Arc::new(MemoryParamsRepo::new());
    let writer = extension_with(repo.clone(), RegistryConfig::default());
    let reader = extension_with(repo.clone(), RegistryConfig::default());
    let foo = PageRef::saved(title("Foo"), PageId::new(9).unwrap());

    let (_, _, _) = render_page(&reader, &foo, "", &[]).await;
    save_page(&writer, &foo, &["lang"]).await;

    let (key, _, _) = render_page(&reader, &foo, "lang=en", &[]).await;
    assert_eq!(key, BASE_KEY);

    reader.registry().invalidate(&foo.identity);
    let (key, _, _) = render_page(&reader, &foo, "lang=en", &[]).await;
    assert_eq!(key, format!("{BASE_KEY}|en|"));
}

#[tokio::test]
async fn length_prefixed_encoding_is_selectable() {
    let repo = Arc::new(MemoryParamsRepo::new());
    let config = RegistryConfig {
        encoding: KeyEncoding::LengthPrefixed,
        ..Default::default()
    };
    let ext = extension_with(repo, config);
    let foo = PageRef::saved(title("Foo"), PageId::new(10).unwrap());
    save_page(&ext, &foo, &["a", "b"]).await;

    let (key, _, _) = render_page(&ext, &foo, "a=x%7C&b=y", &[]).await;
    assert_eq!(key, format!("{BASE_KEY}2:x|1:y;"));
}

#[tokio::test]
async fn missing_last_parameter_still_decodes() {
    let repo = Arc::new(MemoryParamsRepo::new());
    let ext = extension_with(repo, RegistryConfig::default());
    let foo = PageRef::saved(title("Foo"), PageId::new(11).unwrap());
    save_page(&ext, &foo, &["lang", "mode"]).await;

    let (key, _, _) = render_page(&ext, &foo, "lang=en", &[]).await;
    assert_eq!(key, format!("{BASE_KEY}|en||"));

    let suffix = key.strip_prefix(BASE_KEY).unwrap();
    assert_eq!(
        DoublingEncoder::default().decode(suffix, 2),
        Some(vec!["en".to_string(), String::new()])
    );
}
