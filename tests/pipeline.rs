use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use tablec::observe::RecordingObserver;
use tablec::source::{self, Clock, SourceOptions};
use tablec::table::{RawTable, Workbook};
use tablec::{Compiler, Error, ExportConfig, NullObserver, Platform};

fn config_in(root: &Path) -> ExportConfig {
    ExportConfig {
        server_header_dir: root.join("serverHeader"),
        client_header_dir: root.join("clientHeader"),
        server_json_dir: root.join("serverJson"),
        client_json_dir: root.join("clientJson"),
        ..Default::default()
    }
}

fn scenario() -> Workbook {
    Workbook::new(vec![
        RawTable::from_strs(
            "Grade",
            &["Enum", "Value", "Description"],
            &[&["Common", "", "white"], &["Rare", "5", ""]],
        ),
        RawTable::from_strs(
            "Item",
            &["Id", "Name", "Power_1", "Power_2"],
            &[
                &["int32_cs", "string_cs", "int32_s?", "int32?_s"],
                &["1", "Sword", "10", "20"],
                &["2", "Shield", "5", ""],
            ],
        ),
    ])
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_end_to_end_server_and_client() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Compiler::new(config_in(dir.path()), &NullObserver);

    let artifacts = compiler.compile(scenario(), &Platform::ALL).unwrap();
    let written = compiler.write(&artifacts).unwrap();
    assert_eq!(written.len(), 6);

    let server = fs::read_to_string(dir.path().join("serverHeader/gamedata_data.h")).unwrap();
    assert!(server.contains("struct Item : public GameDataRow"));
    assert!(server.contains("    std::string Name;\n"));
    assert!(server.contains("    std::array<int32, 2> Powers{ int32{}, int32{} };\n"));
    assert!(server.contains("::cereal::make_nvp(\"Power_2\", temp_Power_2)"));
    assert!(server.contains("            Powers[1] = temp_Power_2;\n"));

    let server_enum = fs::read_to_string(dir.path().join("serverHeader/gamedata_enum.h")).unwrap();
    assert!(server_enum.contains("BETTER_ENUM(Enum_Grade, uint32, Common, Rare = 5);"));

    let client = fs::read_to_string(dir.path().join("clientHeader/GameData.h")).unwrap();
    assert!(client.contains("struct FItem : public FTableRowBase"));
    assert_eq!(client.matches("FString Name;").count(), 1);
    assert!(client.find("FString Name;").unwrap() < client.find("int32 Id;").unwrap());
    assert!(!client.contains("Power"));

    let client_enum = fs::read_to_string(dir.path().join("clientHeader/GameDataEnum.h")).unwrap();
    assert!(client_enum.contains("enum class Enum_Grade : uint8"));

    let server_json = read_json(&dir.path().join("serverJson/Item.json"));
    assert_eq!(server_json["infos"]["rowcount"], 2);
    assert_eq!(server_json["header"]["Power_1"], "int32");
    assert_eq!(server_json["rows"][1]["Power_2"], 0);
    assert!(server_json["rows"][0].get("Name").is_some());

    let client_json = read_json(&dir.path().join("clientJson/Item.json"));
    let header: Vec<&String> = client_json["header"].as_object().unwrap().keys().collect();
    assert_eq!(header, vec!["Name", "Id"]);
    assert_eq!(client_json["rows"][0]["Name"], "Sword");
    assert_eq!(client_json["rows"][0]["Id"], 1);
}

#[test]
fn test_split_tables_merge_before_export() {
    let dir = tempfile::tempdir().unwrap();
    let part = |name: &str, id: &str| {
        RawTable::from_strs(
            name,
            &["Id", "Level"],
            &[&["int32_cs", "int32_cs"], &[id, "1"]],
        )
    };
    let wb = Workbook::new(vec![part("Monster_1", "1"), part("Monster_2", "2")]);

    let compiler = Compiler::new(config_in(dir.path()), &NullObserver);
    let artifacts = compiler.compile(wb, &[Platform::Server]).unwrap();
    compiler.write(&artifacts).unwrap();

    let doc = read_json(&dir.path().join("serverJson/Monster.json"));
    assert_eq!(doc["rows"][0]["Id"], 1);
    assert_eq!(doc["rows"][1]["Id"], 2);
    assert!(!dir.path().join("serverJson/Monster_1.json").exists());
    assert!(!dir.path().join("clientJson").exists());
}

#[test]
fn test_fingerprint_is_stable_across_runs() {
    let compiler = Compiler::new(ExportConfig::default(), &NullObserver);
    let a = compiler.compile(scenario(), &[Platform::Server]).unwrap();
    let b = compiler.compile(scenario(), &[Platform::Server]).unwrap();
    assert_eq!(a, b);

    let mut grown = scenario();
    grown.tables[1]
        .rows
        .push(vec!["3".into(), "Bow".into(), "1".into(), "2".into()]);
    let c = compiler.compile(grown, &[Platform::Server]).unwrap();

    let hash = |x: &tablec::Artifacts| x.platforms[0].json[0].1["infos"]["dataHashCode"].clone();
    assert_ne!(hash(&a), hash(&c));
    assert_eq!(c.platforms[0].json[0].1["infos"]["rowcount"], 3);
}

#[test]
fn test_failure_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut wb = scenario();
    wb.tables[1].rows[1][0] = String::new();

    let compiler = Compiler::new(config_in(dir.path()), &NullObserver);
    let err = compiler.compile(wb, &Platform::ALL).unwrap_err();
    assert!(matches!(err, Error::Refine(_)));
    assert!(err.to_string().contains("Fail to pass null"));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_write_overwrites_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let stale = config.server_json_dir.join("Item.json");
    fs::create_dir_all(&config.server_json_dir).unwrap();
    fs::write(&stale, "stale").unwrap();

    let obs = RecordingObserver::new();
    let compiler = Compiler::new(config, &obs);
    let artifacts = compiler.compile(scenario(), &[Platform::Server]).unwrap();
    compiler.write(&artifacts).unwrap();

    assert!(fs::read_to_string(&stale).unwrap().starts_with('{'));
    assert!(obs.contains("Item.json"));
    assert!(obs.contains("wrote "));
}

#[test]
fn test_loaded_workbook_with_pinned_clock() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("book.json");
    fs::write(
        &input,
        r##"{"tables":[
            {"name":"Item","columns":["Id","Title","#Memo"],
             "rows":[["int32_cs","string_c","string_cs"],["1","Sword","note"]]}
        ]}"##,
    )
    .unwrap();

    let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    let wb = source::load(
        &input,
        &SourceOptions {
            clock: Clock::Pinned(at),
        },
    )
    .unwrap();

    let compiler = Compiler::new(config_in(dir.path()), &NullObserver);
    let first = compiler.compile(wb.clone(), &Platform::ALL).unwrap();
    let second = compiler.compile(wb, &Platform::ALL).unwrap();
    assert_eq!(first, second);

    let server = first.platform(Platform::Server).unwrap();
    assert!(server.enum_header.contains("// Exported at 2024-05-06T07:08:09Z"));
    assert!(!server.data_header.contains("Title"));
    assert!(!server.data_header.contains("Memo"));
    let server_header = server.json[0].1["header"].as_object().unwrap();
    assert!(server_header.get("Title").is_none());
    assert!(server_header.get("Memo").is_none());
    assert!(server.json[0].1["rows"][0].get("Title").is_none());

    let client = first.platform(Platform::Client).unwrap();
    assert!(client.data_header.contains("FString Title;"));
    assert_eq!(client.json[0].1["header"]["Title"], "FString");
    assert!(client.json[0].1["header"].get("Memo").is_none());
}

#[test]
fn test_client_row_name_from_server_only_id() {
    let wb = Workbook::new(vec![RawTable::from_strs(
        "Item",
        &["Id", "Icon", "Offset_1", "Offset_2"],
        &[
            &["int32_s", "string_c", "float_cs", "float_cs"],
            &["7", "sword.png", "1.5", "2"],
            &["8", "sword.png", "0", "0"],
        ],
    )]);

    let compiler = Compiler::new(ExportConfig::default(), &NullObserver);
    let artifacts = compiler.compile(wb, &Platform::ALL).unwrap();

    let client = artifacts.platform(Platform::Client).unwrap();
    let doc = &client.json[0].1;
    assert_eq!(doc["rows"][0]["Name"], "7");
    assert_eq!(doc["rows"][1]["Name"], "8");
    assert!(doc["header"].get("Id").is_none());
    assert!(client.data_header.contains("    float Offsets[2] = { float{}, float{} };\n"));

    let server = artifacts.platform(Platform::Server).unwrap();
    assert!(server.data_header.contains("    std::array<float, 2> Offsets{ float{}, float{} };\n"));
}
