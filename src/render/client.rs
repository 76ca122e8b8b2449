//! Unreal client headers: `UENUM` enums and `FTableRowBase` row structs.

use crate::config::ExportConfig;
use crate::ir::{EnumDecl, FieldInit, FieldType, GenerateError, StructDecl};
use crate::measure::ColumnLayout;
use crate::token::{BaseType, Platform};

use super::{Banner, HeaderRenderer, generated_include};

pub struct ClientRenderer {
    pub enum_file: String,
    pub data_file: String,
    pub layout: ColumnLayout,
}

impl Default for ClientRenderer {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

impl ClientRenderer {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            enum_file: config.client_enum_file.clone(),
            data_file: config.client_data_file.clone(),
            layout: ColumnLayout::default(),
        }
    }

    fn render_enum(&self, out: &mut String, decl: &EnumDecl) {
        if !decl.docs.is_empty() {
            out.push_str("/*\n");
            for doc in &decl.docs {
                out.push_str(&format!("{} : {}\n", doc.name, doc.text));
            }
            out.push_str("*/\n");
        }

        out.push_str("UENUM(BlueprintType)\n");
        out.push_str(&format!("enum class {} : uint8\n{{\n", decl.name));

        let labels: Vec<String> = decl
            .entries
            .iter()
            .map(|e| match e.explicit {
                Some(v) => format!("{} = {}", e.name, v),
                None => e.name.clone(),
            })
            .collect();
        let width = self.layout.column_width(labels.iter().map(String::as_str));

        for (entry, label) in decl.entries.iter().zip(&labels) {
            out.push_str(&format!(
                "    {}UMETA(DisplayName = \"{}\"),\n",
                self.layout.pad(label, width),
                entry.name
            ));
        }

        out.push_str("};\n\n");
    }
}

impl HeaderRenderer for ClientRenderer {
    fn enum_header(&self, enums: &[EnumDecl], banner: &Banner) -> Result<String, GenerateError> {
        let mut out = String::new();
        banner.write(&mut out);
        out.push('\n');
        out.push_str("#include \"CoreMinimal.h\"\n");
        out.push_str(&format!(
            "#include \"{}\"\n\n",
            generated_include(&self.enum_file)
        ));

        for decl in enums {
            decl.check_range(0, i64::from(u8::MAX))?;
            self.render_enum(&mut out, decl);
        }

        Ok(out)
    }

    fn data_header(
        &self,
        structs: &[StructDecl],
        banner: &Banner,
    ) -> Result<String, GenerateError> {
        let mut out = String::new();
        banner.write(&mut out);
        out.push('\n');
        out.push_str("#include \"CoreMinimal.h\"\n");
        out.push_str("#include \"Engine/DataTable.h\"\n");
        out.push_str(&format!("#include \"{}\"\n", self.enum_file));
        out.push_str(&format!(
            "#include \"{}\"\n",
            generated_include(&self.data_file)
        ));

        for decl in structs {
            out.push('\n');
            out.push_str("USTRUCT(BlueprintType)\n");
            out.push_str(&format!("struct F{} : public FTableRowBase\n{{\n", decl.name));
            out.push_str("    GENERATED_USTRUCT_BODY()\n\n");
            out.push_str("public:\n");

            for (i, field) in decl.fields.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                let type_name = field.ty.base().type_name(Platform::Client);
                out.push_str("    UPROPERTY(EditAnywhere, BlueprintReadWrite, Category = RowData)\n");
                let init = initializer(field.ty.base(), &type_name, field.init);
                match (&field.ty, init) {
                    (FieldType::Scalar(_), Some(init)) => out.push_str(&format!(
                        "    {} {} = {};\n",
                        type_name, field.name, init
                    )),
                    (FieldType::Scalar(_), None) => {
                        out.push_str(&format!("    {} {};\n", type_name, field.name))
                    }
                    (FieldType::Array(_, n), Some(init)) => {
                        let slots = vec![init.as_str(); *n].join(", ");
                        out.push_str(&format!(
                            "    {} {}[{}] = {{ {} }};\n",
                            type_name, field.name, n, slots
                        ));
                    }
                    (FieldType::Array(_, n), None) => {
                        out.push_str(&format!("    {} {}[{}];\n", type_name, field.name, n))
                    }
                }
            }

            out.push_str("};\n");
        }

        Ok(out)
    }
}

/// Scalar or per-slot initializer. Unreal math types are zeroed explicitly.
fn initializer(base: &BaseType, type_name: &str, init: FieldInit) -> Option<String> {
    match (init, base) {
        (FieldInit::Default, _) => None,
        (FieldInit::EnumZero, _) => Some(format!("static_cast<{}>(0)", type_name)),
        (FieldInit::Zero, BaseType::Vector) => Some("FVector::ZeroVector".to_string()),
        (FieldInit::Zero, BaseType::Rotator) => Some("FRotator::ZeroRotator".to_string()),
        (FieldInit::Zero, _) => Some(format!("{}{{}}", type_name)),
    }
}
