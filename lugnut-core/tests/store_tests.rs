// Tests for result store persistence

use lugnut_core::store::{ResultStore, brand_file};
use lugnut_walker::{
    BrandRecord, CategoryNode, ModelRecord, PartDetail, PartLink, PartParameter, SubmodelRecord,
};
use tempfile::TempDir;

fn sample_record() -> BrandRecord {
    let mut record = BrandRecord::new("https://example.com/brands/acme");
    let mut model = ModelRecord::new("https://example.com/models/roadster");

    let mut submodel = SubmodelRecord::new("https://example.com/catalog/9");
    submodel
        .fields
        .insert("Years".to_string(), "2001-2008".to_string());
    submodel
        .fields
        .insert("Engine".to_string(), "1.6".to_string());

    let mut brakes = CategoryNode::new("Brakes");
    let mut pad = PartLink::new("PadSet", "https://example.com/parts/padset");
    pad.parts = Some(vec![PartDetail {
        name: Some("PadSet Front".to_string()),
        parameters: vec![PartParameter {
            key: Some("Width".to_string()),
            value: Some("122mm".to_string()),
        }],
    }]);
    brakes.links.push(pad);
    brakes
        .links
        .push(PartLink::new("Rotor", "https://example.com/parts/rotor"));
    brakes.subcategories.push(CategoryNode::new("Brake Sensors"));

    submodel.parts.push(brakes);
    model.submodels.push(submodel);
    record.models.insert("Roadster".to_string(), model);
    record
}

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_load_missing_file_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let store = ResultStore::load(&temp_dir.path().join("nothing-here.json"));
    assert!(store.is_empty());
}

#[test]
fn test_load_corrupt_file_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Acme.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let store = ResultStore::load(&path);
    assert!(store.is_empty());
}

#[test]
fn test_load_truncated_file_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Acme.json");
    std::fs::write(&path, "{\"Acme\": {\"link\": \"https://exa").unwrap();

    let store = ResultStore::load(&path);
    assert!(store.is_empty());
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[test]
fn test_persist_then_load_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Acme.json");

    let mut store = ResultStore::new();
    store.merge("Acme".to_string(), sample_record());
    store.persist(&path).unwrap();

    let reloaded = ResultStore::load(&path);
    assert_eq!(reloaded.get("Acme"), Some(&sample_record()));
}

#[test]
fn test_persist_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("deep/results/Acme.json");

    let mut store = ResultStore::new();
    store.merge("Acme".to_string(), sample_record());
    store.persist(&path).unwrap();

    assert!(path.exists());
}

#[test]
fn test_persist_is_pretty_printed() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Acme.json");

    let mut store = ResultStore::new();
    store.merge("Acme".to_string(), sample_record());
    store.persist(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\n  \"Acme\""));
    assert!(text.lines().count() > 10);
}

#[test]
fn test_persist_leaves_no_temp_file_behind() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Acme.json");

    let mut store = ResultStore::new();
    store.merge("Acme".to_string(), sample_record());
    store.persist(&path).unwrap();

    let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(entries, vec!["Acme.json".to_string()]);
}

#[test]
fn test_empty_store_persists_an_empty_object() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty.json");

    ResultStore::new().persist(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
}

#[test]
fn test_failed_detail_fetch_is_absent_from_the_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Acme.json");

    let mut store = ResultStore::new();
    store.merge("Acme".to_string(), sample_record());
    store.persist(&path).unwrap();

    // The Rotor link never had its details fetched; the key must simply be
    // missing, not null.
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("\"parts\": null"));
}

// ============================================================================
// Merge Semantics Tests
// ============================================================================

#[test]
fn test_merge_replaces_one_brand_and_keeps_the_rest() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("shared.json");

    let mut store = ResultStore::new();
    store.merge("Honda".to_string(), sample_record());
    store.merge(
        "Toyota".to_string(),
        BrandRecord::new("https://example.com/toyota-old"),
    );
    store.persist(&path).unwrap();

    let mut reloaded = ResultStore::load(&path);
    reloaded.merge(
        "Toyota".to_string(),
        BrandRecord::new("https://example.com/toyota-new"),
    );
    reloaded.persist(&path).unwrap();

    let final_store = ResultStore::load(&path);
    assert_eq!(final_store.get("Honda"), Some(&sample_record()));
    assert_eq!(
        final_store.get("Toyota").unwrap().link,
        "https://example.com/toyota-new"
    );
    assert!(final_store.get("Toyota").unwrap().models.is_empty());
}

#[test]
fn test_merge_keeps_key_insertion_order_across_reloads() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ordered.json");

    let mut store = ResultStore::new();
    store.merge("Zeta".to_string(), BrandRecord::new("/zeta"));
    store.merge("Alpha".to_string(), BrandRecord::new("/alpha"));
    store.persist(&path).unwrap();

    // Replacing Zeta must not move it to the back.
    let mut reloaded = ResultStore::load(&path);
    reloaded.merge("Zeta".to_string(), BrandRecord::new("/zeta-2"));
    reloaded.persist(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let zeta = text.find("\"Zeta\"").unwrap();
    let alpha = text.find("\"Alpha\"").unwrap();
    assert!(zeta < alpha);
}

#[test]
fn test_iter_yields_brands_in_order() {
    let mut store = ResultStore::new();
    store.merge("Zeta".to_string(), BrandRecord::new("/zeta"));
    store.merge("Alpha".to_string(), BrandRecord::new("/alpha"));

    let names: Vec<&str> = store.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["Zeta", "Alpha"]);
}

// ============================================================================
// Brand File Naming Tests
// ============================================================================

#[test]
fn test_brand_file_appends_json_extension() {
    let path = brand_file(std::path::Path::new("out"), "Acme");
    assert_eq!(path, std::path::PathBuf::from("out/Acme.json"));
}

#[test]
fn test_brand_file_flattens_path_separators() {
    let dir = std::path::Path::new("out");
    assert_eq!(
        brand_file(dir, "Mercedes/AMG"),
        std::path::PathBuf::from("out/Mercedes_AMG.json")
    );
    assert_eq!(
        brand_file(dir, "Back\\Slash"),
        std::path::PathBuf::from("out/Back_Slash.json")
    );
}

#[test]
fn test_brand_file_keeps_spaces_and_unicode() {
    let dir = std::path::Path::new("out");
    assert_eq!(
        brand_file(dir, "Land Rover"),
        std::path::PathBuf::from("out/Land Rover.json")
    );
    assert_eq!(
        brand_file(dir, "Škoda"),
        std::path::PathBuf::from("out/Škoda.json")
    );
}
