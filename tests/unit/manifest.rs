use super::*;

fn id(s: &str) -> EffectId {
    s.parse().unwrap()
}

fn manifest() -> EffectManifest {
    EffectManifest::new()
        .with(EffectId::solid(), EffectInfo::default())
        .with(EffectId::media(), EffectInfo::default())
        .with(EffectId::blend(), EffectInfo::default())
        .with(
            id("synth/noise"),
            EffectInfo {
                description: "value noise".to_string(),
                tags: vec!["noise".to_string()],
                ..EffectInfo::default()
            },
        )
        .with(
            id("filter/blur"),
            EffectInfo {
                description: "gaussian blur".to_string(),
                ..EffectInfo::default()
            },
        )
        .with(
            id("filter/gradient"),
            EffectInfo {
                starter: true,
                ..EffectInfo::default()
            },
        )
        .with(
            id("text/title"),
            EffectInfo {
                external_texture: Some("textTex".to_string()),
                ..EffectInfo::default()
            },
        )
}

#[test]
fn effect_id_parses_namespace_and_name() {
    let e = id("filter/blur");
    assert_eq!(e.namespace(), "filter");
    assert_eq!(e.name(), "blur");
    assert_eq!(e.to_string(), "filter/blur");
}

#[test]
fn effect_id_rejects_malformed_input() {
    assert!("blur".parse::<EffectId>().is_err());
    assert!("/blur".parse::<EffectId>().is_err());
    assert!("filter/".parse::<EffectId>().is_err());
    assert!("fil ter/blur".parse::<EffectId>().is_err());
    assert!("1x/blur".parse::<EffectId>().is_err());
}

#[test]
fn classify_resolves_closed_set_of_classes() {
    let m = manifest();
    let gens = vec!["synth".to_string()];
    let q = ManifestQuery::new(&m, &gens);

    assert_eq!(q.classify(&EffectId::solid()), EffectClass::Solid);
    assert_eq!(q.classify(&EffectId::media()), EffectClass::Media);
    assert_eq!(q.classify(&EffectId::blend()), EffectClass::Compositor);
    assert_eq!(q.classify(&id("synth/noise")), EffectClass::Generator);
    assert_eq!(q.classify(&id("filter/blur")), EffectClass::Filter);
    // Marked as starter by the manifest even though its namespace is not a generator one.
    assert_eq!(q.classify(&id("filter/gradient")), EffectClass::Generator);
    assert_eq!(q.classify(&id("text/title")), EffectClass::Text);
    // Unknown effects fall back to the namespace convention.
    assert_eq!(q.classify(&id("synth/unknown")), EffectClass::Generator);
    assert_eq!(q.classify(&id("warp/unknown")), EffectClass::Filter);
}

#[test]
fn texture_slots_cover_media_and_text() {
    let m = manifest();
    let gens = vec!["synth".to_string()];
    let q = ManifestQuery::new(&m, &gens);
    assert_eq!(q.texture_slot(&EffectId::media()), Some(MEDIA_TEXTURE));
    assert_eq!(q.texture_slot(&id("text/title")), Some("textTex"));
    assert_eq!(q.texture_slot(&id("filter/blur")), None);
}

#[test]
fn catalogs_are_filtered_and_sorted() {
    let m = manifest();
    let gens = vec!["synth".to_string()];
    let q = ManifestQuery::new(&m, &gens);

    let all: Vec<String> = q.all_effects().iter().map(|e| e.id.to_string()).collect();
    assert_eq!(
        all,
        vec!["filter/blur", "filter/gradient", "synth/noise", "text/title"]
    );

    let starters: Vec<String> = q
        .starter_effects()
        .iter()
        .map(|e| e.id.to_string())
        .collect();
    assert_eq!(starters, vec!["filter/gradient", "synth/noise", "text/title"]);

    let layer: Vec<String> = q
        .layer_effects()
        .iter()
        .map(|e| e.id.to_string())
        .collect();
    assert_eq!(layer, vec!["filter/blur"]);

    let noise = q
        .all_effects()
        .into_iter()
        .find(|e| e.id == id("synth/noise"))
        .unwrap();
    assert_eq!(noise.description, "value noise");
    assert_eq!(noise.tags, vec!["noise".to_string()]);
}

#[test]
fn manifest_loads_from_json() {
    let m = EffectManifest::from_json_str(
        r#"{
            "synth/noise": { "starter": true, "description": "noise", "tags": ["a"] },
            "text/title": { "externalTexture": "textTex" }
        }"#,
    )
    .unwrap();
    assert!(m.get(&id("synth/noise")).unwrap().starter);
    assert_eq!(
        m.get(&id("text/title")).unwrap().external_texture.as_deref(),
        Some("textTex")
    );
    assert!(EffectManifest::from_json_str(r#"{ "bogus": {} }"#).is_err());
}
