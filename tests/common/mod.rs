#![allow(dead_code)]

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use pdf_table_ocr::{OcrEngine, OcrWord, PageRenderer};

/// A text cell drawn with its baseline origin at (`x`, `y`) in PDF space.
pub type Cell<'a> = (i64, i64, &'a str);

/// Maps control codes to letters so a font only decodes through `ToUnicode`:
/// 01 N, 02 a, 03 K, 04 1, 05 4, 06 0, 07 `.`.
pub const CONTROL_CODE_CMAP: &str = "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<00> <FF>
endcodespacerange
7 beginbfchar
<01> <004E>
<02> <0061>
<03> <004B>
<04> <0031>
<05> <0034>
<06> <0030>
<07> <002E>
endbfchar
endcmap
CMapName currentdict /CMap defineresource pop
end
end
";

fn courier() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    }
}

fn cell_operations(cells: &[Cell<'_>]) -> Vec<Operation> {
    let mut operations = Vec::new();
    for &(x, y, text) in cells {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new("Td", vec![x.into(), y.into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(text)]));
        operations.push(Operation::new("ET", vec![]));
    }
    operations
}

fn draw_xobject(name: &str, matrix: [i64; 6]) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("cm", matrix.iter().map(|value| (*value).into()).collect()),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

/// Adds one A4 page per content list under a shared `resources` dictionary,
/// then compresses and saves the document.
fn save_pages(
    mut doc: Document,
    path: &Path,
    contents: Vec<Vec<Operation>>,
    resources: Dictionary,
) -> Result<(), Box<dyn std::error::Error>> {
    let pages_id = doc.new_object_id();
    let resources_id = doc.add_object(resources);

    let mut page_ids = Vec::new();
    for operations in contents {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<_>>(),
            "Count" => i64::try_from(page_ids.len())?,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    doc.save(path)?;
    Ok(())
}

/// Builds an A4 PDF whose pages draw each cell in its own text object.
/// An empty page list draws nothing.
pub fn create_table_pdf(path: &Path, pages: &[Vec<Cell<'_>>]) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");
    let font_id = doc.add_object(courier());
    let resources = dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    };

    let contents = pages.iter().map(|cells| cell_operations(cells)).collect();
    save_pages(doc, path, contents, resources)
}

/// One page drawing `page_cells` directly and `form_cells` inside a Form
/// XObject placed with a translation of (`dx`, `dy`). The form carries its
/// own font resources.
pub fn create_form_table_pdf(
    path: &Path,
    page_cells: &[Cell<'_>],
    form_cells: &[Cell<'_>],
    (dx, dy): (i64, i64),
) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");
    let page_font_id = doc.add_object(courier());
    let form_font_id = doc.add_object(courier());

    let form_content = Content {
        operations: cell_operations(form_cells),
    };
    let form_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 595.into(), 1042.into()],
            "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), dx.into(), dy.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => form_font_id,
                },
            },
        },
        form_content.encode()?,
    ));

    let mut operations = cell_operations(page_cells);
    operations.extend(draw_xobject("Fm1", [1, 0, 0, 1, 0, 0]));

    let resources = dictionary! {
        "Font" => dictionary! {
            "F1" => page_font_id,
        },
        "XObject" => dictionary! {
            "Fm1" => form_id,
        },
    };
    save_pages(doc, path, vec![operations], resources)
}

/// One page of text cells that also draws a 16x16 grey image (`Im1`) and a
/// CMYK image (`Im2`) the exporter cannot re-encode.
pub fn create_image_pdf(path: &Path, cells: &[Cell<'_>]) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");
    let font_id = doc.add_object(courier());
    let grey_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 16,
            "Height" => 16,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![128; 16 * 16],
    ));
    let cmyk_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 1,
            "Height" => 1,
            "ColorSpace" => "DeviceCMYK",
            "BitsPerComponent" => 8,
        },
        vec![0, 0, 0, 255],
    ));

    let mut operations = cell_operations(cells);
    operations.extend(draw_xobject("Im1", [100, 0, 0, 100, 400, 400]));
    operations.extend(draw_xobject("Im2", [10, 0, 0, 10, 400, 300]));

    let resources = dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
        "XObject" => dictionary! {
            "Im1" => grey_id,
            "Im2" => cmyk_id,
        },
    };
    save_pages(doc, path, vec![operations], resources)
}

/// One page whose font has no usable encoding for the shown bytes, so its
/// text is only readable through [`CONTROL_CODE_CMAP`].
pub fn create_to_unicode_pdf(path: &Path, cells: &[Cell<'_>]) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");
    let cmap_id = doc.add_object(Stream::new(
        dictionary! {},
        CONTROL_CODE_CMAP.as_bytes().to_vec(),
    ));
    let mut font = courier();
    font.set("FirstChar", 1);
    font.set("LastChar", 7);
    font.set("Widths", vec![Object::Integer(600); 7]);
    font.set("ToUnicode", cmap_id);
    let font_id = doc.add_object(font);

    let resources = dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    };
    save_pages(doc, path, vec![cell_operations(cells)], resources)
}

/// Writes a blank white PNG.
pub fn write_png(path: &Path, width: u32, height: u32) -> Result<(), Box<dyn std::error::Error>> {
    image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255])).save(path)?;
    Ok(())
}

pub fn word(text: &str, left: u32, top: u32, width: u32, height: u32, confidence: f32) -> OcrWord {
    OcrWord {
        text: text.to_string(),
        left,
        top,
        width,
        height,
        confidence,
    }
}

/// Renders every page as a small blank PNG.
pub struct BlankRenderer;

impl PageRenderer for BlankRenderer {
    fn render_page(&self, _pdf: &Path, _page: u32, _dpi: u32, output: &Path) -> Result<(), String> {
        write_png(output, 40, 40).map_err(|error| error.to_string())
    }
}

pub struct FailingRenderer;

impl PageRenderer for FailingRenderer {
    fn render_page(&self, _pdf: &Path, page: u32, _dpi: u32, _output: &Path) -> Result<(), String> {
        Err(format!("renderer unavailable for page {page}"))
    }
}

/// Returns the same words for every image, failing for images whose file
/// name contains `fail_on`.
#[derive(Default)]
pub struct ScriptedOcr {
    pub words: Vec<OcrWord>,
    pub fail_on: Option<String>,
}

impl OcrEngine for ScriptedOcr {
    fn recognize(&self, image: &Path) -> Result<Vec<OcrWord>, String> {
        let name = image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(marker) = &self.fail_on
            && name.contains(marker.as_str())
        {
            return Err(format!("tesseract could not read {name}"));
        }
        Ok(self.words.clone())
    }
}
