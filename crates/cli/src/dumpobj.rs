//! dumpobj - Dump PDF object structure as XML or JSON
//!
//! A command line tool for inspecting trailers, indirect objects and
//! decoded stream payloads.

use clap::{ArgAction, Parser};
use quire_core::document::PDFDocument;
use quire_core::error::Result;
use quire_core::model::{PDFDict, PDFObject};
use quire_core::{DocumentBuilder, PdfError};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Escape special characters for XML output.
fn escape(s: &[u8]) -> String {
    let mut result = String::with_capacity(s.len());
    for &byte in s {
        match byte {
            b'&' => result.push_str("&amp;"),
            b'<' => result.push_str("&lt;"),
            b'>' => result.push_str("&gt;"),
            b'"' => result.push_str("&quot;"),
            b'\'' => result.push_str("&#39;"),
            0..=31 | 127..=255 => result.push_str(&format!("&#{byte};")),
            _ => result.push(byte as char),
        }
    }
    result
}

/// How stream payloads are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamCodec {
    /// Attributes only
    None,
    /// Undecoded payload bytes
    Raw,
    /// Decoded payload bytes
    Binary,
    /// Decoded payload, escaped into the dump
    Text,
}

struct Dumper<'d, W: Write> {
    out: W,
    doc: &'d PDFDocument,
    codec: StreamCodec,
    json: bool,
}

impl<W: Write> Dumper<'_, W> {
    fn xml(&mut self, obj: &PDFObject) -> Result<()> {
        match obj {
            PDFObject::Null => write!(self.out, "<null />")?,
            PDFObject::Bool(b) => write!(self.out, "<boolean>{b}</boolean>")?,
            PDFObject::Int(n) => write!(self.out, "<number>{n}</number>")?,
            PDFObject::Real(n) => write!(self.out, "<number>{n}</number>")?,
            PDFObject::String(s) | PDFObject::HexString(s) => {
                write!(self.out, r#"<string size="{}">{}</string>"#, s.len(), escape(s))?;
            }
            PDFObject::Name(name) => {
                write!(self.out, "<literal>{}</literal>", escape(name.as_bytes()))?;
            }
            PDFObject::Keyword(kw) => {
                write!(self.out, "<keyword>{}</keyword>", escape(kw.as_bytes()))?;
            }
            PDFObject::Array(items) => {
                writeln!(self.out, r#"<list size="{}">"#, items.len())?;
                for item in items {
                    self.xml(item)?;
                    writeln!(self.out)?;
                }
                write!(self.out, "</list>")?;
            }
            PDFObject::Dict(dict) => self.xml_dict(dict)?,
            PDFObject::Stream(stream) => match self.codec {
                StreamCodec::Raw => self.out.write_all(stream.get_rawdata())?,
                StreamCodec::Binary => {
                    let data = self.doc.stream_bytes(obj)?;
                    self.out.write_all(&data)?;
                }
                StreamCodec::Text | StreamCodec::None => {
                    writeln!(self.out, "<stream>")?;
                    writeln!(self.out, "<props>")?;
                    self.xml_dict(&stream.attrs)?;
                    writeln!(self.out)?;
                    writeln!(self.out, "</props>")?;
                    if self.codec == StreamCodec::Text {
                        let data = self.doc.stream_bytes(obj)?;
                        writeln!(
                            self.out,
                            r#"<data size="{}">{}</data>"#,
                            data.len(),
                            escape(&data)
                        )?;
                    }
                    write!(self.out, "</stream>")?;
                }
            },
            PDFObject::Ref(r) => write!(self.out, r#"<ref id="{}" />"#, r.objid)?,
        }
        Ok(())
    }

    fn xml_dict(&mut self, dict: &PDFDict) -> Result<()> {
        writeln!(self.out, r#"<dict size="{}">"#, dict.len())?;
        let mut keys: Vec<&String> = dict.keys().collect();
        keys.sort();
        for key in keys {
            writeln!(self.out, "<key>{}</key>", escape(key.as_bytes()))?;
            write!(self.out, "<value>")?;
            self.xml(&dict[key])?;
            writeln!(self.out, "</value>")?;
        }
        write!(self.out, "</dict>")?;
        Ok(())
    }

    fn to_json(&self, obj: &PDFObject) -> Result<Value> {
        Ok(match obj {
            PDFObject::Null => Value::Null,
            PDFObject::Bool(b) => json!(b),
            PDFObject::Int(n) => json!(n),
            PDFObject::Real(n) => json!(n),
            PDFObject::Name(name) => json!({ "name": name }),
            PDFObject::String(s) | PDFObject::HexString(s) => {
                json!({ "string": String::from_utf8_lossy(s) })
            }
            PDFObject::Keyword(kw) => json!({ "keyword": kw }),
            PDFObject::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.to_json(item))
                    .collect::<Result<_>>()?,
            ),
            PDFObject::Dict(dict) => self.json_dict(dict)?,
            PDFObject::Stream(stream) => {
                let mut record = Map::new();
                record.insert("props".into(), self.json_dict(&stream.attrs)?);
                match self.codec {
                    StreamCodec::None => {}
                    StreamCodec::Raw => {
                        record.insert(
                            "data".into(),
                            json!(String::from_utf8_lossy(stream.get_rawdata())),
                        );
                    }
                    StreamCodec::Binary | StreamCodec::Text => {
                        let data = self.doc.stream_bytes(obj)?;
                        record.insert("data".into(), json!(String::from_utf8_lossy(&data)));
                    }
                }
                json!({ "stream": record })
            }
            PDFObject::Ref(r) => json!({ "ref": [r.objid, r.genno] }),
        })
    }

    fn json_dict(&self, dict: &PDFDict) -> Result<Value> {
        let mut map = Map::new();
        for (key, value) in dict {
            map.insert(key.clone(), self.to_json(value)?);
        }
        Ok(Value::Object(map))
    }

    fn object(&mut self, objid: u32) -> Result<()> {
        let genno = self.doc.xref().get(objid).map_or(0, |entry| entry.genno());
        let obj = match self.doc.fetch(objid, genno) {
            Ok(obj) => obj,
            Err(e) => {
                eprintln!("not found: object {objid} - {e}");
                return Ok(());
            }
        };
        if self.json {
            let record = ObjectRecord {
                id: objid,
                object: self.to_json(&obj)?,
            };
            serde_json::to_writer(&mut self.out, &record).map_err(io::Error::from)?;
            writeln!(self.out)?;
        } else {
            writeln!(self.out, r#"<object id="{objid}">"#)?;
            self.xml(&obj)?;
            writeln!(self.out)?;
            writeln!(self.out, "</object>")?;
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn trailers(&mut self, show_fallback_xref: bool) -> Result<()> {
        if self.doc.xref().is_fallback() && !show_fallback_xref {
            eprintln!(
                "Warning: This PDF does not have a valid xref. Use --show-fallback-xref \
                 to display the content of a fallback xref that contains all objects."
            );
            return Ok(());
        }
        for trailer in self.doc.trailers() {
            if self.json {
                let record = TrailerRecord {
                    trailer: self.json_dict(trailer)?,
                };
                serde_json::to_writer(&mut self.out, &record).map_err(io::Error::from)?;
                writeln!(self.out)?;
            } else {
                writeln!(self.out, "<trailer>")?;
                self.xml_dict(trailer)?;
                writeln!(self.out)?;
                writeln!(self.out, "</trailer>")?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ObjectRecord {
    id: u32,
    object: Value,
}

#[derive(Serialize)]
struct TrailerRecord {
    trailer: Value,
}

#[derive(Parser, Debug)]
#[command(name = "dumpobj")]
#[command(about = "Dump PDF object structure as XML or JSON")]
#[command(version)]
struct Args {
    /// One or more paths to PDF files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Comma-separated list of object IDs to dump
    #[arg(short = 'i', long = "objects", value_delimiter = ',')]
    objects: Vec<u32>,

    /// Dump all objects and trailers
    #[arg(short = 'a', long = "all", action = ArgAction::SetTrue)]
    all: bool,

    /// Show the rebuilt xref if the PDF has no valid one
    #[arg(long = "show-fallback-xref", action = ArgAction::SetTrue)]
    show_fallback_xref: bool,

    /// Password tried as both owner and user password
    #[arg(short = 'P', long)]
    password: Option<String>,

    #[arg(long = "owner-password")]
    owner_password: Option<String>,

    #[arg(long = "user-password")]
    user_password: Option<String>,

    /// Path to file where output is written, or "-" for stdout
    #[arg(short = 'o', long, default_value = "-")]
    outfile: String,

    /// Write stream objects without decoding (raw)
    #[arg(short = 'r', long = "raw-stream", action = ArgAction::SetTrue, group = "codec")]
    raw_stream: bool,

    /// Write decoded stream bytes
    #[arg(short = 'b', long = "binary-stream", action = ArgAction::SetTrue, group = "codec")]
    binary_stream: bool,

    /// Write decoded streams as escaped text
    #[arg(short = 't', long = "text-stream", action = ArgAction::SetTrue, group = "codec")]
    text_stream: bool,

    /// Emit one JSON record per object or trailer instead of XML
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

fn open(path: &Path, args: &Args) -> Result<PDFDocument> {
    let mut builder = DocumentBuilder::from_path(path);
    if let Some(pw) = &args.password {
        builder = builder.password(pw);
    }
    if let Some(pw) = &args.owner_password {
        builder = builder.owner_password(pw);
    }
    if let Some(pw) = &args.user_password {
        builder = builder.user_password(pw);
    }
    builder.open()
}

fn main() -> core::result::Result<(), Box<dyn core::error::Error>> {
    let args = Args::parse();

    let codec = if args.raw_stream {
        StreamCodec::Raw
    } else if args.binary_stream {
        StreamCodec::Binary
    } else if args.text_stream {
        StreamCodec::Text
    } else {
        StreamCodec::None
    };

    let mut output: Box<dyn Write> = if args.outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        Box::new(BufWriter::new(File::create(&args.outfile)?))
    };

    for path in &args.files {
        if !path.exists() {
            eprintln!("Error: File not found: {}", path.display());
            std::process::exit(1);
        }

        let doc = open(path, &args)?;
        if let Some(PdfError::InvalidPassword) = doc.encryption_failure() {
            eprintln!(
                "Warning: {}: no password matched, encrypted objects are unavailable",
                path.display()
            );
        }

        let mut dumper = Dumper {
            out: &mut output,
            doc: &doc,
            codec,
            json: args.json,
        };
        let json = args.json;
        if args.all {
            if !json {
                write!(dumper.out, "<pdf>")?;
            }
            for objid in doc.objids() {
                dumper.object(objid)?;
            }
            dumper.trailers(true)?;
            if !json {
                write!(dumper.out, "</pdf>")?;
            }
        } else if !args.objects.is_empty() {
            if !json {
                write!(dumper.out, "<pdf>")?;
            }
            for &objid in &args.objects {
                dumper.object(objid)?;
            }
            if !json {
                write!(dumper.out, "</pdf>")?;
            }
        } else {
            dumper.trailers(args.show_fallback_xref)?;
        }
    }

    output.flush()?;
    Ok(())
}
