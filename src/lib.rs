pub mod config;
pub mod export;
pub mod ir;
pub mod measure;
pub mod merge;
pub mod observe;
pub mod pipeline;
pub mod refine;
pub mod render;
pub mod source;
pub mod table;
pub mod token;

use wasm_bindgen::prelude::*;

pub use config::ExportConfig;
pub use observe::{NullObserver, Observer, TracingObserver};
pub use pipeline::{Artifacts, Compiler, Error, PlatformArtifacts};
pub use token::Platform;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Compile a workbook JSON document and return one platform's enum header
/// followed by its data header.
#[wasm_bindgen(js_name = "compileTables")]
pub fn compile_tables(workbook_json: &str, platform: &str) -> Result<String, String> {
    let platform =
        Platform::from_str(platform).ok_or_else(|| format!("Unknown platform: {}", platform))?;
    let workbook = source::from_json(workbook_json).map_err(|e| e.to_string())?;

    let compiler = Compiler::new(ExportConfig::default(), &NullObserver);
    let artifacts = compiler
        .compile(workbook, &[platform])
        .map_err(|e| e.to_string())?;

    Ok(artifacts
        .platforms
        .into_iter()
        .map(|p| format!("{}\n{}", p.enum_header, p.data_header))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOK: &str = r#"{"tables":[
        {"name":"Grade","columns":["Enum","Value","Description"],"rows":[["Common","",""],["Rare","",""]]},
        {"name":"Item","columns":["Id","Grade"],"rows":[["int32_cs","Enum_Grade_cs"],["1","Rare"]]}
    ]}"#;

    #[test]
    fn test_compile_tables_server() {
        let out = compile_tables(BOOK, "server").unwrap();
        let enums = out.find("BETTER_ENUM(Enum_Grade").unwrap();
        let rows = out.find("struct Item : public GameDataRow").unwrap();
        assert!(enums < rows);
    }

    #[test]
    fn test_compile_tables_errors_are_strings() {
        assert!(compile_tables(BOOK, "web").unwrap_err().contains("Unknown platform"));
        assert!(compile_tables("{", "client").is_err());

        let bad = BOOK.replace("\"1\",\"Rare\"", "\"1\",\"Mythic\"");
        let err = compile_tables(&bad, "client").unwrap_err();
        assert!(err.contains("Mythic"));
    }
}
