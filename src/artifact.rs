//! Generated artifact: a Rust module holding every embedded file.
//!
//! Layout of the text before formatting:
//!
//! ```text
//! pub mod <namespace> {
//!     ...Resource / Record types...
//!     static RECORDS: &[(&str, Record)] = &[        <- end of header
//!         ("a.txt", Record { .. }),                  <- aggregator body, one literal per entry
//!     ];                                             <- aggregator closing separator
//!     pub static RESOURCES: LazyLock<..> = ..;       <- footer
//! }
//! ```
//!
//! [`render`] parses the concatenation with `syn` and pretty-prints it, so a malformed artifact
//! is rejected before anything is written.

use anyhow::{Context, Result, bail};
use std::collections::HashSet;

use crate::engine::encoding::{decode_data, digest_hex};
use crate::{Entry, StorageMode};

/// Appended by the aggregator after every entry but the last.
pub const CONTINUE_SEPARATOR: &str = ",\n";
/// Appended by the aggregator once the batch is complete. Closes `RECORDS`.
pub const CLOSING_SEPARATOR: &str = "\n    ];\n";

const RECORDS_IDENT: &str = "RECORDS";
const NAMESPACE_SLOT: &str = "__NAMESPACE__";
const IMPORTS_SLOT: &str = "__IMPORTS__";
const DECODE_SLOT: &str = "__DECODE__";

const BANNER: &str = "// @generated by kobako. Do not edit by hand.\n\n";

const HEADER: &str = r#"pub mod __NAMESPACE__ {
    //! Embedded files. Look them up with `get` or iterate `RESOURCES`.

    use std::collections::HashMap;
    use std::sync::LazyLock;

    use base64::Engine as _;
__IMPORTS__
    /// One embedded file, decoded.
    #[derive(Clone, Debug)]
    pub struct Resource {
        pub content_type: &'static str,
        /// Blake3 of `data`, lowercase hex.
        pub digest: &'static str,
        pub data: Vec<u8>,
    }

    struct Record {
        content_type: &'static str,
        digest: &'static str,
        data: &'static str,
    }

    static RECORDS: &[(&str, Record)] = &[
"#;

const FOOTER: &str = r#"
    /// Every embedded file keyed by its path relative to the embedded root. Decoded on first use.
    pub static RESOURCES: LazyLock<HashMap<&'static str, Resource>> = LazyLock::new(|| {
        RECORDS
            .iter()
            .filter_map(|(path, record)| {
                let data = decode(record.data)?;
                Some((
                    *path,
                    Resource {
                        content_type: record.content_type,
                        digest: record.digest,
                        data,
                    },
                ))
            })
            .collect()
    });

    /// Look up one embedded file by its path.
    pub fn get(path: &str) -> Option<&'static Resource> {
        RESOURCES.get(path)
    }
__DECODE__}
"#;

const GZIP_IMPORTS: &str = "    use std::io::Read as _;\n";

const GZIP_DECODE: &str = r#"
    fn decode(data: &str) -> Option<Vec<u8>> {
        let stored = base64::engine::general_purpose::STANDARD.decode(data).ok()?;
        let mut raw = Vec::new();
        flate2::read::GzDecoder::new(stored.as_slice())
            .read_to_end(&mut raw)
            .ok()?;
        Some(raw)
    }
"#;

const RAW_DECODE: &str = r#"
    fn decode(data: &str) -> Option<Vec<u8>> {
        base64::engine::general_purpose::STANDARD.decode(data).ok()
    }
"#;

/// Everything before the first entry.
pub fn header(namespace: &str, mode: StorageMode) -> String {
    let imports = match mode {
        StorageMode::Gzip => GZIP_IMPORTS,
        StorageMode::Raw => "",
    };
    HEADER
        .replace(NAMESPACE_SLOT, namespace)
        .replace(IMPORTS_SLOT, imports)
}

/// Everything after the aggregator's closing separator.
pub fn footer(mode: StorageMode) -> String {
    let decode = match mode {
        StorageMode::Gzip => GZIP_DECODE,
        StorageMode::Raw => RAW_DECODE,
    };
    FOOTER.replace(DECODE_SLOT, decode)
}

/// One `RECORDS` element. Strings go through `{:?}`, which always yields a valid Rust literal.
pub fn entry_literal(entry: &Entry) -> String {
    format!(
        "        ({:?}, Record {{ content_type: {:?}, digest: {:?}, data: {:?} }})",
        entry.key, entry.content_type, entry.digest, entry.data
    )
}

/// Concatenate header, aggregator body and footer, check it parses as Rust, and pretty-print.
pub fn render(namespace: &str, mode: StorageMode, body: &str) -> Result<String> {
    let head = header(namespace, mode);
    let foot = footer(mode);
    let mut text = String::with_capacity(head.len() + body.len() + foot.len());
    text.push_str(&head);
    text.push_str(body);
    text.push_str(&foot);

    let file = syn::parse_file(&text).context("generated artifact is not valid Rust")?;
    let mut out = String::from(BANNER);
    out.push_str(&prettyplease::unparse(&file));
    Ok(out)
}

/// One `RECORDS` element read back from an artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredRecord {
    pub key: String,
    pub content_type: String,
    pub digest: String,
    pub data: String,
}

impl StoredRecord {
    /// Raw file bytes.
    pub fn decode(&self, mode: StorageMode) -> Result<Vec<u8>> {
        decode_data(&self.data, mode).with_context(|| format!("decode {}", self.key))
    }
}

fn str_lit(expr: &syn::Expr) -> Option<String> {
    match expr {
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(s),
            ..
        }) => Some(s.value()),
        _ => None,
    }
}

fn record_from_expr(expr: &syn::Expr) -> Result<StoredRecord> {
    let syn::Expr::Tuple(tuple) = expr else {
        bail!("RECORDS element is not a tuple");
    };
    let mut elems = tuple.elems.iter();
    let (Some(key), Some(syn::Expr::Struct(record)), None) =
        (elems.next(), elems.next(), elems.next())
    else {
        bail!("RECORDS element is not `(path, Record {{ .. }})`");
    };
    let key = str_lit(key).context("record path is not a string literal")?;
    let field = |name: &str| -> Result<String> {
        record
            .fields
            .iter()
            .find(|f| matches!(&f.member, syn::Member::Named(id) if id == name))
            .and_then(|f| str_lit(&f.expr))
            .with_context(|| format!("record {}: missing string field `{}`", key, name))
    };
    Ok(StoredRecord {
        content_type: field("content_type")?,
        digest: field("digest")?,
        data: field("data")?,
        key,
    })
}

/// Parse an artifact back into its records, in file order.
pub fn read_records(text: &str) -> Result<Vec<StoredRecord>> {
    let file = syn::parse_file(text).context("parse artifact")?;
    let items = file
        .items
        .iter()
        .find_map(|item| match item {
            syn::Item::Mod(m) => m.content.as_ref().map(|(_, items)| items),
            _ => None,
        })
        .context("artifact has no inline module")?;
    let table = items
        .iter()
        .find_map(|item| match item {
            syn::Item::Static(s) if s.ident == RECORDS_IDENT => Some(&*s.expr),
            _ => None,
        })
        .with_context(|| format!("artifact has no `{}` table", RECORDS_IDENT))?;
    let syn::Expr::Reference(reference) = table else {
        bail!("`{}` is not a slice reference", RECORDS_IDENT);
    };
    let syn::Expr::Array(array) = &*reference.expr else {
        bail!("`{}` is not an array literal", RECORDS_IDENT);
    };
    array.elems.iter().map(record_from_expr).collect()
}

/// Decode every record and check its digest and key uniqueness. Returns the record count.
pub fn verify(text: &str, mode: StorageMode) -> Result<usize> {
    let records = read_records(text)?;
    let mut seen = HashSet::with_capacity(records.len());
    for r in &records {
        if !seen.insert(r.key.as_str()) {
            bail!("duplicate key {}", r.key);
        }
        let raw = r.decode(mode)?;
        if digest_hex(&raw) != r.digest {
            bail!("digest mismatch for {}", r.key);
        }
    }
    Ok(records.len())
}
