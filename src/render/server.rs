//! C++ server headers: `BETTER_ENUM` enums and cereal-serializable row structs.

use crate::config::ExportConfig;
use crate::ir::{
    Codec, EnumDecl, Field, FieldInit, FieldType, GenerateError, Place, Stmt, StructDecl,
};
use crate::token::Platform;

use super::{Banner, HeaderRenderer};

const INDENT: &str = "    ";

pub struct ServerRenderer {
    pub namespace: String,
    pub enum_file: String,
}

impl Default for ServerRenderer {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

impl ServerRenderer {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            namespace: config.server_namespace.clone(),
            enum_file: config.server_enum_file.clone(),
        }
    }

    fn open_namespace(&self, out: &mut String) {
        out.push_str(&format!("namespace {}\n{{\n\n", self.namespace));
    }

    fn close_namespace(&self, out: &mut String) {
        out.push_str(&format!("}} // namespace {}\n", self.namespace));
    }

    fn render_struct(&self, out: &mut String, decl: &StructDecl) {
        out.push_str(&format!("struct {} : public GameDataRow\n{{\n", decl.name));

        for field in &decl.fields {
            render_field(out, field);
        }

        if let Some(codec) = &decl.codec {
            out.push('\n');
            render_serialize(out, codec);
        }

        out.push_str("};\n\n");
        render_stream_operator(out, &decl.name);
    }
}

impl HeaderRenderer for ServerRenderer {
    fn enum_header(&self, enums: &[EnumDecl], banner: &Banner) -> Result<String, GenerateError> {
        let mut out = String::new();
        banner.write(&mut out);
        out.push('\n');
        self.open_namespace(&mut out);

        for decl in enums {
            decl.check_range(0, i64::from(u32::MAX))?;

            if !decl.docs.is_empty() {
                out.push_str("/*\n");
                for doc in &decl.docs {
                    out.push_str(&format!("{} : {}\n", doc.name, doc.text));
                }
                out.push_str("*/\n");
            }

            let entries: Vec<String> = decl
                .entries
                .iter()
                .map(|e| match e.explicit {
                    Some(v) => format!("{} = {}", e.name, v),
                    None => e.name.clone(),
                })
                .collect();

            out.push_str(&format!("BETTER_ENUM({}, uint32", decl.name));
            for entry in &entries {
                out.push_str(", ");
                out.push_str(entry);
            }
            out.push_str(");\n");
        }

        out.push('\n');
        self.close_namespace(&mut out);
        Ok(out)
    }

    fn data_header(
        &self,
        structs: &[StructDecl],
        banner: &Banner,
    ) -> Result<String, GenerateError> {
        let mut out = String::new();
        banner.write(&mut out);
        out.push_str(&format!("#include \"{}\"\n\n", self.enum_file));
        self.open_namespace(&mut out);

        out.push_str("struct GameDataRow\n{\n");
        out.push_str(INDENT);
        out.push_str("virtual ~GameDataRow() = default;\n};\n\n");

        for decl in structs {
            self.render_struct(&mut out, decl);
        }

        self.close_namespace(&mut out);
        Ok(out)
    }
}

fn render_field(out: &mut String, field: &Field) {
    let type_name = field.ty.base().type_name(Platform::Server);

    match &field.ty {
        FieldType::Scalar(_) => match initializer(&type_name, field.init) {
            Some(init) => out.push_str(&format!(
                "{}{} {} = {};\n",
                INDENT, type_name, field.name, init
            )),
            None => out.push_str(&format!("{}{} {};\n", INDENT, type_name, field.name)),
        },
        FieldType::Array(_, n) => match initializer(&type_name, field.init) {
            // One initializer per slot; better enums have no default constructor.
            Some(init) => {
                let slots = vec![init.as_str(); *n].join(", ");
                out.push_str(&format!(
                    "{}std::array<{}, {}> {}{{ {} }};\n",
                    INDENT, type_name, n, field.name, slots
                ));
            }
            None => out.push_str(&format!(
                "{}std::array<{}, {}> {};\n",
                INDENT, type_name, n, field.name
            )),
        },
    }
}

fn initializer(type_name: &str, init: FieldInit) -> Option<String> {
    match init {
        FieldInit::Default => None,
        FieldInit::Zero => Some(format!("{}{{}}", type_name)),
        FieldInit::EnumZero => Some(format!("{}::_from_integral(0)", type_name)),
    }
}

fn render_serialize(out: &mut String, codec: &Codec) {
    let body = INDENT.repeat(2);
    let stmt_indent = INDENT.repeat(3);

    out.push_str("    template <typename Archive>\n");
    out.push_str("    void serialize(Archive& archive)\n");
    out.push_str("    {\n");

    for shadow in &codec.shadows {
        out.push_str(&format!("{}{} {};\n", body, shadow.ty, shadow.name));
    }
    out.push('\n');

    out.push_str(&format!(
        "{}if (typeid(archive) == typeid(cereal::JSONOutputArchive))\n{}{{\n",
        body, body
    ));
    for stmt in &codec.encode {
        out.push_str(&stmt_indent);
        out.push_str(&render_stmt(stmt));
        out.push('\n');
    }
    out.push_str(&format!("{}}}\n\n", body));

    if !codec.shadows.is_empty() {
        out.push_str(&format!("{}archive(\n", body));
        for (i, shadow) in codec.shadows.iter().enumerate() {
            let lead = if i == 0 { "  " } else { ", " };
            out.push_str(&format!(
                "{}{}::cereal::make_nvp(\"{}\", {})\n",
                stmt_indent, lead, shadow.key, shadow.name
            ));
        }
        out.push_str(&format!("{});\n\n", body));
    }

    out.push_str(&format!(
        "{}if (typeid(archive) == typeid(cereal::JSONInputArchive))\n{}{{\n",
        body, body
    ));
    for stmt in &codec.decode {
        out.push_str(&stmt_indent);
        out.push_str(&render_stmt(stmt));
        out.push('\n');
    }
    out.push_str(&format!("{}}}\n", body));
    out.push_str("    }\n");
}

fn render_place(place: &Place) -> String {
    match place {
        Place::Field(name) => name.clone(),
        Place::Element { field, slot } => format!("{}[{}]", field, slot),
    }
}

fn render_stmt(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Load { shadow, place } => format!("{} = {};", shadow, render_place(place)),
        Stmt::EnumToName { shadow, place } => {
            format!("{} = {}._to_string();", shadow, render_place(place))
        }
        Stmt::CompositeToText { shadow, place } => {
            format!("{} = {}.ToString();", shadow, render_place(place))
        }
        Stmt::Store { place, shadow } => format!("{} = {};", render_place(place), shadow),
        Stmt::EnumFromName {
            place,
            shadow,
            enum_type,
        } => format!(
            "{} = {}::_from_string({}.c_str());",
            render_place(place),
            enum_type,
            shadow
        ),
        Stmt::CompositeFromText { place, shadow } => {
            format!("{}.InitFromString({});", render_place(place), shadow)
        }
    }
}

fn render_stream_operator(out: &mut String, name: &str) {
    out.push_str("template <typename traits>\n");
    out.push_str("inline std::basic_ostream<wchar_t, traits>&\n");
    out.push_str(&format!(
        "operator<< (std::basic_ostream<wchar_t, traits>& os, const {}& rhs)\n",
        name
    ));
    out.push_str("{\n");
    out.push_str("    std::stringstream strStream;\n\n");
    out.push_str("    {\n");
    out.push_str("        cereal::JSONOutputArchive archive(strStream, cereal::JSONOutputArchive::Options::NoIndent());\n");
    out.push_str("        auto rowData(rhs);\n");
    out.push_str("        rowData.serialize(archive);\n");
    out.push_str("    }\n\n");
    out.push_str("    return os << FromUTF8(boost::replace_all_copy(strStream.str(), \"\\n\", \"\"));\n");
    out.push_str("}\n\n");
}
