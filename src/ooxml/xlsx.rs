use super::{attr, element_end, escape_xml, find_tag, set_attr, Package};
use anyhow::{anyhow, bail, Context};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const STYLES_PART: &str = "xl/styles.xml";
const FALLBACK_SHEET_PART: &str = "xl/worksheets/sheet1.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    /// 1-based column (A = 1).
    pub col: u32,
    /// 1-based row.
    pub row: u32,
}

impl CellRef {
    pub fn new(col: u32, row: u32) -> Self {
        CellRef { col, row }
    }

    pub fn parse(s: &str) -> Option<Self> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?([1-9][0-9]*)$").expect("static regex"));
        let caps = re.captures(s.trim())?;
        let mut col = 0u32;
        for c in caps[1].chars() {
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        }
        let row = caps[2].parse().ok()?;
        Some(CellRef { col, row })
    }

    pub fn column_letters(col: u32) -> String {
        let mut n = col;
        let mut out = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            out.push((b'A' + rem as u8) as char);
            n = (n - 1) / 26;
        }
        out.iter().rev().collect()
    }

    pub fn below(self) -> Self {
        CellRef {
            col: self.col,
            row: self.row + 1,
        }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::column_letters(self.col), self.row)
    }
}

/// First worksheet of a workbook package, with its styles, opened for editing.
pub struct Workbook {
    package: Package,
    sheet_part: String,
    sheet: String,
    styles: Option<String>,
    fill_cache: HashMap<(u32, String), u32>,
}

impl Workbook {
    pub fn open(package: Package) -> anyhow::Result<Self> {
        let sheet_part = first_sheet_part(&package)?;
        let sheet = package.part_text(&sheet_part)?;
        let styles = match package.part(STYLES_PART) {
            Some(_) => Some(package.part_text(STYLES_PART)?),
            None => None,
        };
        Ok(Workbook {
            package,
            sheet_part,
            sheet,
            styles,
            fill_cache: HashMap::new(),
        })
    }

    /// Writes `text` into `cell` as an inline string, keeping the cell's style.
    pub fn set_text(&mut self, cell: CellRef, text: &str) -> anyhow::Result<()> {
        let style = cell_style(&self.sheet, cell)?;
        self.sheet = write_inline_string(&self.sheet, cell, text, style)?;
        Ok(())
    }

    /// Paints `cell` with a solid fill. `rgb` is `#RRGGBB`.
    pub fn set_fill(&mut self, cell: CellRef, rgb: &str) -> anyhow::Result<()> {
        let argb = format!("FF{}", rgb.trim().trim_start_matches('#').to_ascii_uppercase());
        let base = cell_style(&self.sheet, cell)?.unwrap_or(0);
        let style = match self.fill_cache.get(&(base, argb.clone())) {
            Some(s) => *s,
            None => {
                let styles = self
                    .styles
                    .as_deref()
                    .ok_or_else(|| anyhow!("workbook has no {} part", STYLES_PART))?;
                let (updated, id) = add_solid_fill_style(styles, base, &argb)?;
                self.styles = Some(updated);
                self.fill_cache.insert((base, argb), id);
                id
            }
        };
        self.sheet = set_cell_style(&self.sheet, cell, style)?;
        Ok(())
    }

    #[cfg(test)]
    pub fn cell_style(&self, cell: CellRef) -> anyhow::Result<Option<u32>> {
        cell_style(&self.sheet, cell)
    }

    /// `(fgColor rgb)` of the fill used by style index `style`, if solid.
    #[cfg(test)]
    pub fn style_fill_rgb(&self, style: u32) -> anyhow::Result<Option<String>> {
        let Some(styles) = self.styles.as_deref() else {
            return Ok(None);
        };
        let xfs = section_children(styles, "cellXfs", "xf")?;
        let Some(xf) = xfs.get(style as usize) else {
            return Ok(None);
        };
        let fill_id: usize = attr(xf, "fillId").and_then(|v| v.parse().ok()).unwrap_or(0);
        let fills = section_children(styles, "fills", "fill")?;
        Ok(fills
            .get(fill_id)
            .and_then(|f| f.find("<fgColor").map(|i| &f[i..]))
            .and_then(|tag| attr(tag, "rgb"))
            .map(|s| s.to_string()))
    }

    pub fn into_bytes(mut self) -> anyhow::Result<Vec<u8>> {
        self.package
            .set_part(&self.sheet_part, self.sheet.into_bytes());
        if let Some(styles) = self.styles {
            self.package.set_part(STYLES_PART, styles.into_bytes());
        }
        self.package.to_bytes()
    }
}

fn first_sheet_part(package: &Package) -> anyhow::Result<String> {
    let (Some(_), Some(_)) = (package.part(WORKBOOK_PART), package.part(WORKBOOK_RELS_PART)) else {
        if package.part(FALLBACK_SHEET_PART).is_some() {
            return Ok(FALLBACK_SHEET_PART.to_string());
        }
        bail!("package is not a spreadsheet (no workbook part)");
    };
    let workbook = package.part_text(WORKBOOK_PART)?;
    let rels = package.part_text(WORKBOOK_RELS_PART)?;

    let sheet_at = find_tag(&workbook, 0, "<sheet").ok_or_else(|| anyhow!("workbook has no sheets"))?;
    let sheet_tag = &workbook[sheet_at..sheet_at + workbook[sheet_at..].find('>').unwrap_or(0)];
    let rid = attr(sheet_tag, "r:id").ok_or_else(|| anyhow!("sheet entry has no r:id"))?;

    let mut pos = 0;
    while let Some(at) = find_tag(&rels, pos, "<Relationship") {
        let end = at + rels[at..].find('>').unwrap_or(0);
        let tag = &rels[at..end];
        if attr(tag, "Id") == Some(rid) {
            let target = attr(tag, "Target").ok_or_else(|| anyhow!("relationship {} has no Target", rid))?;
            let target = target.trim_start_matches('/');
            return Ok(if target.starts_with("xl/") {
                target.to_string()
            } else {
                format!("xl/{}", target)
            });
        }
        pos = end;
    }
    bail!("relationship {} not found", rid)
}

struct SheetData {
    start: usize,
    end: usize,
    /// Content span between the tags; `None` for `<sheetData/>`.
    inner: Option<(usize, usize)>,
}

fn sheet_data(sheet: &str) -> anyhow::Result<SheetData> {
    let start = find_tag(sheet, 0, "<sheetData").ok_or_else(|| anyhow!("worksheet has no sheetData"))?;
    let end = element_end(sheet, start, "sheetData").ok_or_else(|| anyhow!("unterminated sheetData"))?;
    let tag_end = start + sheet[start..].find('>').unwrap_or(0);
    let inner = (!sheet[..tag_end].ends_with('/')).then(|| (tag_end + 1, end - "</sheetData>".len()));
    Ok(SheetData { start, end, inner })
}

struct RawRow {
    start: usize,
    end: usize,
    tag_end: usize,
    num: u32,
    /// Content span between the tags; `None` for `<row/>`.
    cells: Option<(usize, usize)>,
}

/// Rows of the sheetData span. `r` is optional; a row without it follows
/// the previous one.
fn rows_in(sheet: &str, from: usize, to: usize) -> anyhow::Result<Vec<RawRow>> {
    let mut out = Vec::new();
    let mut pos = from;
    let mut prev = 0u32;
    while let Some(at) = find_tag(sheet, pos, "<row") {
        if at >= to {
            break;
        }
        let end = element_end(sheet, at, "row").ok_or_else(|| anyhow!("unterminated row"))?;
        let tag_end = at + sheet[at..].find('>').unwrap_or(0);
        let num = match attr(&sheet[at..tag_end], "r") {
            Some(r) => r.parse().with_context(|| format!("bad row number {}", r))?,
            None => prev + 1,
        };
        let cells = (!sheet[..tag_end].ends_with('/')).then(|| (tag_end + 1, end - "</row>".len()));
        out.push(RawRow {
            start: at,
            end,
            tag_end,
            num,
            cells,
        });
        prev = num;
        pos = end;
    }
    Ok(out)
}

struct RawCell<'a> {
    start: usize,
    end: usize,
    at: CellRef,
    xml: &'a str,
}

/// Cells of one row. A cell without `r` sits right after the previous one.
fn cells_in<'a>(sheet: &'a str, row: &RawRow) -> anyhow::Result<Vec<RawCell<'a>>> {
    let Some((from, to)) = row.cells else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    let mut pos = from;
    let mut prev_col = 0u32;
    while let Some(at) = find_tag(sheet, pos, "<c") {
        if at >= to {
            break;
        }
        let end = element_end(sheet, at, "c").ok_or_else(|| anyhow!("unterminated cell"))?;
        let tag_end = at + sheet[at..].find('>').unwrap_or(0);
        let cell = match attr(&sheet[at..tag_end], "r") {
            Some(r) => CellRef::parse(r).ok_or_else(|| anyhow!("bad cell reference {}", r))?,
            None => CellRef::new(prev_col + 1, row.num),
        };
        prev_col = cell.col;
        out.push(RawCell {
            start: at,
            end,
            at: cell,
            xml: &sheet[at..end],
        });
        pos = end;
    }
    Ok(out)
}

fn find_cell(sheet: &str, target: CellRef) -> anyhow::Result<Option<RawCell<'_>>> {
    let Some((from, to)) = sheet_data(sheet)?.inner else {
        return Ok(None);
    };
    for row in rows_in(sheet, from, to)? {
        if row.num == target.row {
            return Ok(cells_in(sheet, &row)?.into_iter().find(|c| c.at == target));
        }
    }
    Ok(None)
}

fn cell_style(sheet: &str, target: CellRef) -> anyhow::Result<Option<u32>> {
    Ok(find_cell(sheet, target)?.and_then(|cell| {
        let tag_end = cell.xml.find('>').unwrap_or(0);
        attr(&cell.xml[..tag_end], "s").and_then(|s| s.parse().ok())
    }))
}

fn inline_string_cell(cell: CellRef, text: &str, style: Option<u32>) -> String {
    let s = style.map(|s| format!(" s=\"{}\"", s)).unwrap_or_default();
    format!(
        "<c r=\"{}\"{} t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
        cell,
        s,
        escape_xml(text)
    )
}

fn write_inline_string(sheet: &str, cell: CellRef, text: &str, style: Option<u32>) -> anyhow::Result<String> {
    replace_or_insert_cell(sheet, cell, &inline_string_cell(cell, text, style))
}

fn set_cell_style(sheet: &str, target: CellRef, style: u32) -> anyhow::Result<String> {
    if let Some(cell) = find_cell(sheet, target)? {
        let tag_end = cell.xml.find('>').unwrap_or(0) + 1;
        let new_tag = set_attr(&cell.xml[..tag_end], "s", &style.to_string());
        return Ok(format!(
            "{}{}{}{}",
            &sheet[..cell.start],
            new_tag,
            &cell.xml[tag_end..],
            &sheet[cell.end..]
        ));
    }
    let empty = format!("<c r=\"{}\" s=\"{}\"/>", target, style);
    replace_or_insert_cell(sheet, target, &empty)
}

/// Puts `cell_xml` at `target`: replaces an existing cell, or inserts the
/// cell (and its row, if missing) in sorted position.
fn replace_or_insert_cell(sheet: &str, target: CellRef, cell_xml: &str) -> anyhow::Result<String> {
    let data = sheet_data(sheet)?;
    let Some((from, close_at)) = data.inner else {
        let row = format!("<sheetData><row r=\"{}\">{}</row></sheetData>", target.row, cell_xml);
        return Ok(format!("{}{}{}", &sheet[..data.start], row, &sheet[data.end..]));
    };

    for row in rows_in(sheet, from, close_at)? {
        if row.num == target.row {
            let Some((_, row_close)) = row.cells else {
                let open_tag = format!("{}>", sheet[row.start..row.tag_end].trim_end_matches('/'));
                return Ok(format!(
                    "{}{}{}</row>{}",
                    &sheet[..row.start],
                    open_tag,
                    cell_xml,
                    &sheet[row.end..]
                ));
            };
            for cell in cells_in(sheet, &row)? {
                if cell.at.col == target.col {
                    return Ok(format!("{}{}{}", &sheet[..cell.start], cell_xml, &sheet[cell.end..]));
                }
                if cell.at.col > target.col {
                    return Ok(format!("{}{}{}", &sheet[..cell.start], cell_xml, &sheet[cell.start..]));
                }
            }
            return Ok(format!("{}{}{}", &sheet[..row_close], cell_xml, &sheet[row_close..]));
        }
        if row.num > target.row {
            let new_row = format!("<row r=\"{}\">{}</row>", target.row, cell_xml);
            return Ok(format!("{}{}{}", &sheet[..row.start], new_row, &sheet[row.start..]));
        }
    }
    let row = format!("<row r=\"{}\">{}</row>", target.row, cell_xml);
    Ok(format!("{}{}{}", &sheet[..close_at], row, &sheet[close_at..]))
}

/// Child elements of the first `<section>` in `xml`.
fn section_children<'a>(xml: &'a str, section: &str, child: &str) -> anyhow::Result<Vec<&'a str>> {
    let open = format!("<{}", section);
    let Some(at) = find_tag(xml, 0, &open) else {
        return Ok(Vec::new());
    };
    let end = element_end(xml, at, section).ok_or_else(|| anyhow!("unterminated {}", section))?;
    let child_open = format!("<{}", child);
    let mut out = Vec::new();
    let mut pos = at + xml[at..].find('>').unwrap_or(0) + 1;
    while let Some(c) = find_tag(xml, pos, &child_open) {
        if c >= end {
            break;
        }
        let c_end = element_end(xml, c, child).ok_or_else(|| anyhow!("unterminated {}", child))?;
        out.push(&xml[c..c_end]);
        pos = c_end;
    }
    Ok(out)
}

/// Appends `child` to `<section>` and bumps its `count`. Returns the new
/// document and the index of the appended child.
fn append_to_section(xml: &str, section: &str, child_tag: &str, child: &str) -> anyhow::Result<(String, u32)> {
    let existing = section_children(xml, section, child_tag)?.len() as u32;
    let open = format!("<{}", section);
    let Some(at) = find_tag(xml, 0, &open) else {
        bail!("styles part has no <{}>", section);
    };
    let end = element_end(xml, at, section).ok_or_else(|| anyhow!("unterminated {}", section))?;
    let tag_end = at + xml[at..].find('>').unwrap_or(0) + 1;
    let start_tag = &xml[at..tag_end];
    let count = (existing + 1).to_string();

    let rebuilt = if start_tag.ends_with("/>") {
        let open_tag = set_attr(&format!("{}>", start_tag.trim_end_matches("/>")), "count", &count);
        format!("{}{}</{}>", open_tag, child, section)
    } else {
        let close = format!("</{}>", section);
        let inner = &xml[tag_end..end - close.len()];
        format!("{}{}{}{}", set_attr(start_tag, "count", &count), inner, child, close)
    };
    Ok((format!("{}{}{}", &xml[..at], rebuilt, &xml[end..]), existing))
}

fn add_solid_fill_style(styles: &str, base_xf: u32, argb: &str) -> anyhow::Result<(String, u32)> {
    let fill = format!(
        "<fill><patternFill patternType=\"solid\"><fgColor rgb=\"{0}\"/><bgColor rgb=\"{0}\"/></patternFill></fill>",
        argb
    );
    let (styles, fill_id) = append_to_section(styles, "fills", "fill", &fill)?;

    let xfs = section_children(&styles, "cellXfs", "xf")?;
    let base = xfs
        .get(base_xf as usize)
        .or_else(|| xfs.first())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "<xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/>".to_string());
    let tag_end = base.find('>').unwrap_or(0) + 1;
    let tag = set_attr(&base[..tag_end], "fillId", &fill_id.to_string());
    let tag = set_attr(&tag, "applyFill", "1");
    let xf = format!("{}{}", tag, &base[tag_end..]);
    append_to_section(&styles, "cellXfs", "xf", &xf)
}
