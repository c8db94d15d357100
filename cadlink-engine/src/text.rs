//! 文字转换：绘图端多行文字内联格式代码与目标端 RTF 富文本互转。
//!
//! 两个方向都是单遍从左到右扫描，配合格式状态栈：组开始压栈，组结束弹栈。
//! 未知代码读到下一个分隔符后丢弃。

use std::collections::HashMap;

use cadlink_core::{
    drafting::{MText, Text},
    freeform::TextEntity,
    geometry::Plane,
};
use tracing::debug;

use crate::context::ConversionContext;
use crate::errors::ConvertError;
use crate::primitive::{ocs_plane, plane_to_target, point_to_source};

const NBSP: char = '\u{a0}';

/// 当前生效的字符格式。`font` 为 `None` 表示默认字体。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatState {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub font: Option<String>,
}

impl FormatState {
    #[inline]
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub format: FormatState,
}

/// 结构化富文本：格式相同的相邻文字合并为一段，换行以 `\n` 表示。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    runs: Vec<TextRun>,
}

impl RichText {
    #[inline]
    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    /// 至少一段文字带有非默认格式。
    pub fn is_formatted(&self) -> bool {
        self.runs.iter().any(|run| !run.format.is_plain())
    }

    fn push_str(&mut self, text: &str, format: &FormatState) {
        if text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.format == *format => last.text.push_str(text),
            _ => self.runs.push(TextRun {
                text: text.to_string(),
                format: format.clone(),
            }),
        }
    }

    fn push(&mut self, ch: char, format: &FormatState) {
        let mut buf = [0u8; 4];
        self.push_str(ch.encode_utf8(&mut buf), format);
    }
}

fn normalize_font(name: &str, default_font: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case(default_font) {
        None
    } else {
        Some(name.to_string())
    }
}

/// `%%d`、`%%c`、`%%p`、`%%%` 特殊字符。
fn special_code(code: char) -> Option<char> {
    match code {
        'd' | 'D' => Some('°'),
        'c' | 'C' => Some('⌀'),
        'p' | 'P' => Some('±'),
        '%' => Some('%'),
        _ => None,
    }
}

type Scanner<'a> = std::iter::Peekable<std::str::Chars<'a>>;

/// 读取到 `;` 为止（分号本身被消耗）。
fn read_argument(chars: &mut Scanner<'_>) -> String {
    let mut argument = String::new();
    for ch in chars.by_ref() {
        if ch == ';' {
            break;
        }
        argument.push(ch);
    }
    argument
}

/// 未知代码：若在下一个 `\`、`{`、`}` 之前出现 `;`，连同参数一起丢弃。
fn skip_unknown(chars: &mut Scanner<'_>) {
    let mut ahead = chars.clone();
    while let Some(ch) = ahead.next() {
        match ch {
            ';' => {
                *chars = ahead;
                return;
            }
            '\\' | '{' | '}' => return,
            _ => {}
        }
    }
}

/// `\fname|b1|i0|c0|p34;`
fn apply_font(state: &mut FormatState, argument: &str, default_font: &str) {
    let mut parts = argument.split('|');
    let name = parts.next().unwrap_or_default();
    for part in parts {
        if let Some(flag) = part.strip_prefix('b') {
            state.bold = flag == "1";
        } else if let Some(flag) = part.strip_prefix('i') {
            state.italic = flag == "1";
        }
    }
    state.font = normalize_font(name, default_font);
}

/// 堆叠分数 `\S1/2;`、`\S1^2;`、`\S1#2;` 统一写作 `1/2`。
fn stacked_fraction(argument: &str) -> String {
    match argument.find(['^', '/', '#']) {
        Some(index) => format!(
            "{}/{}",
            argument[..index].trim(),
            argument[index + 1..].trim()
        ),
        None => argument.to_string(),
    }
}

/// 解析多行文字内容。
pub fn parse_mtext(contents: &str, default_font: &str) -> RichText {
    let mut rich = RichText::default();
    let mut stack: Vec<FormatState> = Vec::new();
    let mut state = FormatState::default();
    let mut chars = contents.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' => stack.push(state.clone()),
            '}' => {
                if let Some(previous) = stack.pop() {
                    state = previous;
                }
            }
            '\\' => match chars.next() {
                Some('P') => rich.push('\n', &state),
                Some('~') => rich.push(NBSP, &state),
                Some(literal @ ('\\' | '{' | '}')) => rich.push(literal, &state),
                Some('L') => state.underline = true,
                Some('l') => state.underline = false,
                // 上划线与删除线在目标端没有对应。
                Some('O' | 'o' | 'K' | 'k') => {}
                Some('f' | 'F') => {
                    let argument = read_argument(&mut chars);
                    apply_font(&mut state, &argument, default_font);
                }
                Some('S') => {
                    let argument = read_argument(&mut chars);
                    rich.push_str(&stacked_fraction(&argument), &state);
                }
                Some('H' | 'W' | 'C' | 'c' | 'T' | 'Q' | 'A' | 'p') => {
                    read_argument(&mut chars);
                }
                Some(code) => {
                    debug!(code = %code, "丢弃未知格式代码");
                    skip_unknown(&mut chars);
                }
                None => rich.push('\\', &state),
            },
            '%' if chars.peek() == Some(&'%') => {
                let mut ahead = chars.clone();
                ahead.next();
                match ahead.next().and_then(special_code) {
                    Some(symbol) => {
                        chars = ahead;
                        rich.push(symbol, &state);
                    }
                    None => rich.push('%', &state),
                }
            }
            other => rich.push(other, &state),
        }
    }
    rich
}

/// 去掉全部格式代码后的纯文本，段落分隔为 `\n`。
pub fn mtext_to_plain(contents: &str) -> String {
    parse_mtext(contents, "").plain_text()
}

/// 纯文本写成多行文字内容，转义控制字符。
pub fn escape_mtext(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '{' => escaped.push_str("\\{"),
            '}' => escaped.push_str("\\}"),
            '\n' => escaped.push_str("\\P"),
            NBSP => escaped.push_str("\\~"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// 富文本写回多行文字格式代码；带格式的段各自成组。
pub fn rich_to_mtext(rich: &RichText, default_font: &str) -> String {
    let mut contents = String::new();
    for run in rich.runs() {
        let body = escape_mtext(&run.text);
        let format = &run.format;
        if format.is_plain() {
            contents.push_str(&body);
            continue;
        }
        contents.push('{');
        if format.bold || format.italic || format.font.is_some() {
            contents.push_str(&format!(
                "\\f{}|b{}|i{};",
                format.font.as_deref().unwrap_or(default_font),
                u8::from(format.bold),
                u8::from(format.italic)
            ));
        }
        if format.underline {
            contents.push_str("\\L");
        }
        contents.push_str(&body);
        contents.push('}');
    }
    contents
}

fn push_rtf_text(out: &mut String, text: &str) {
    let mut units = [0u16; 2];
    for ch in text.chars() {
        match ch {
            '\\' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\par "),
            NBSP => out.push_str("\\~"),
            '\t' => out.push_str("\\tab "),
            ch if ch.is_ascii() => out.push(ch),
            ch => {
                for unit in ch.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{}?", *unit as i16));
                }
            }
        }
    }
}

/// 富文本写成 RTF。字体表第 0 项为默认字体。
pub fn rich_to_rtf(rich: &RichText, default_font: &str) -> String {
    let mut fonts: Vec<&str> = vec![default_font];
    for run in rich.runs() {
        if let Some(font) = run.format.font.as_deref() {
            if !fonts.contains(&font) {
                fonts.push(font);
            }
        }
    }

    let mut out = String::from("{\\rtf1\\ansi\\deff0{\\fonttbl");
    for (index, font) in fonts.iter().enumerate() {
        out.push_str(&format!("{{\\f{index} {font};}}"));
    }
    out.push('}');

    for run in rich.runs() {
        let index = run
            .format
            .font
            .as_deref()
            .and_then(|font| fonts.iter().position(|known| *known == font))
            .unwrap_or(0);
        out.push_str(&format!("{{\\f{index}"));
        if run.format.bold {
            out.push_str("\\b");
        }
        if run.format.italic {
            out.push_str("\\i");
        }
        if run.format.underline {
            out.push_str("\\ul");
        }
        out.push(' ');
        push_rtf_text(&mut out, &run.text);
        out.push('}');
    }
    out.push('}');
    out
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Word(String, Option<i32>),
    Symbol(char),
    Text(char),
}

fn tokenize(rtf: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = rtf.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' => tokens.push(Token::Open),
            '}' => tokens.push(Token::Close),
            '\r' | '\n' => {}
            '\\' => match chars.peek().copied() {
                Some(letter) if letter.is_ascii_alphabetic() => {
                    let mut name = String::new();
                    while let Some(letter) = chars.next_if(|c| c.is_ascii_alphabetic()) {
                        name.push(letter);
                    }
                    let mut digits = String::new();
                    if let Some(sign) = chars.next_if_eq(&'-') {
                        digits.push(sign);
                    }
                    while let Some(digit) = chars.next_if(|c| c.is_ascii_digit()) {
                        digits.push(digit);
                    }
                    chars.next_if_eq(&' ');
                    let parameter = digits.parse().ok();
                    // \uN 之后跟一个替代字符。
                    if name == "u" && parameter.is_some() {
                        chars.next_if(|c| !matches!(c, '\\' | '{' | '}'));
                    }
                    tokens.push(Token::Word(name, parameter));
                }
                Some('\'') => {
                    chars.next();
                    let hex: String = (0..2).filter_map(|_| chars.next()).collect();
                    if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                        tokens.push(Token::Text(char::from(byte)));
                    }
                }
                Some(symbol) => {
                    chars.next();
                    tokens.push(Token::Symbol(symbol));
                }
                None => {}
            },
            other => tokens.push(Token::Text(other)),
        }
    }
    tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Body,
    FontTable,
    Skip,
}

#[derive(Debug, Clone)]
struct RtfState {
    bold: bool,
    italic: bool,
    underline: bool,
    font: Option<i32>,
    destination: Destination,
}

impl Default for RtfState {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            underline: false,
            font: None,
            destination: Destination::Body,
        }
    }
}

/// 解析 RTF；不是 RTF 封装时返回 `None`。
pub fn parse_rtf(rtf: &str, default_font: &str) -> Option<RichText> {
    if !rtf.trim_start().starts_with("{\\rtf") {
        return None;
    }

    let mut rich = RichText::default();
    let mut fonts: HashMap<i32, String> = HashMap::new();
    let mut font_entry: Option<i32> = None;
    let mut font_name = String::new();
    let mut high_surrogate: Option<u16> = None;
    let mut stack: Vec<RtfState> = Vec::new();
    let mut state = RtfState::default();

    let format_of = |state: &RtfState, fonts: &HashMap<i32, String>| FormatState {
        bold: state.bold,
        italic: state.italic,
        underline: state.underline,
        font: state
            .font
            .and_then(|index| fonts.get(&index))
            .and_then(|name| normalize_font(name, default_font)),
    };

    for token in tokenize(rtf) {
        match (state.destination, token) {
            (_, Token::Open) => stack.push(state.clone()),
            (_, Token::Close) => match stack.pop() {
                Some(previous) => state = previous,
                None => break,
            },
            (_, Token::Symbol('*')) => state.destination = Destination::Skip,
            (Destination::Skip, _) => {}
            (Destination::FontTable, Token::Word(name, parameter)) => {
                if name == "f" {
                    font_entry = parameter;
                    font_name.clear();
                }
            }
            (Destination::FontTable, Token::Text(';')) => {
                if let Some(index) = font_entry.take() {
                    fonts.insert(index, font_name.trim().to_string());
                }
                font_name.clear();
            }
            (Destination::FontTable, Token::Text(ch)) => font_name.push(ch),
            (Destination::FontTable, Token::Symbol(_)) => {}
            (Destination::Body, Token::Word(name, parameter)) => match name.as_str() {
                "fonttbl" => state.destination = Destination::FontTable,
                "colortbl" | "stylesheet" | "info" | "pict" | "header" | "footer" => {
                    state.destination = Destination::Skip;
                }
                "par" | "line" => rich.push('\n', &format_of(&state, &fonts)),
                "tab" => rich.push('\t', &format_of(&state, &fonts)),
                "b" => state.bold = parameter != Some(0),
                "i" => state.italic = parameter != Some(0),
                "ul" => state.underline = parameter != Some(0),
                "ulnone" => state.underline = false,
                "plain" => {
                    state.bold = false;
                    state.italic = false;
                    state.underline = false;
                    state.font = None;
                }
                "f" => state.font = parameter,
                "u" => {
                    let Some(value) = parameter else { continue };
                    let unit = value as i16 as u16;
                    if (0xD800..0xDC00).contains(&unit) {
                        high_surrogate = Some(unit);
                        continue;
                    }
                    let decoded = match high_surrogate.take() {
                        Some(high) => char::decode_utf16([high, unit]).next().and_then(Result::ok),
                        None => char::from_u32(u32::from(unit)),
                    };
                    if let Some(ch) = decoded {
                        rich.push(ch, &format_of(&state, &fonts));
                    }
                }
                _ => {}
            },
            (Destination::Body, Token::Symbol(symbol)) => match symbol {
                '\\' | '{' | '}' => rich.push(symbol, &format_of(&state, &fonts)),
                '~' => rich.push(NBSP, &format_of(&state, &fonts)),
                _ => {}
            },
            (Destination::Body, Token::Text(ch)) => rich.push(ch, &format_of(&state, &fonts)),
        }
    }
    Some(rich)
}

fn check_height(height: f64, entity: &'static str) -> Result<(), ConvertError> {
    if height.is_finite() && height > 0.0 {
        Ok(())
    } else {
        Err(ConvertError::malformed(
            entity,
            format!("text height {height} is not positive"),
        ))
    }
}

/// 多行文字转为目标文字；只有出现格式时才生成 RTF 封装。
pub fn mtext_to_target(mtext: &MText, ctx: &ConversionContext) -> Result<TextEntity, ConvertError> {
    check_height(mtext.height, "mtext")?;
    let plane = match Plane::from_x_axis(mtext.location, mtext.direction, mtext.normal) {
        Some(plane) => plane,
        None => ocs_plane(mtext.location, mtext.normal, "mtext")?,
    };
    let rich = parse_mtext(&mtext.contents, &ctx.default_font);
    let rich_text = rich
        .is_formatted()
        .then(|| rich_to_rtf(&rich, &ctx.default_font));
    let font = rich
        .runs()
        .iter()
        .find_map(|run| run.format.font.clone())
        .unwrap_or_else(|| ctx.default_font.clone());

    Ok(TextEntity {
        plane: plane_to_target(&plane, ctx),
        height: ctx.to_target(mtext.height),
        plain_text: rich.plain_text(),
        rich_text,
        wrap_width: mtext.width.map(|width| ctx.to_target(width)),
        font: Some(font),
        justification: mtext.attachment,
    })
}

/// 单行文字：平面绕法向量转过文字旋转角，只解码 `%%` 特殊字符。
pub fn text_to_target(text: &Text, ctx: &ConversionContext) -> Result<TextEntity, ConvertError> {
    check_height(text.height, "text")?;
    let plane = ocs_plane(text.position, text.normal, "text")?.rotated(text.rotation);
    Ok(TextEntity {
        plane: plane_to_target(&plane, ctx),
        height: ctx.to_target(text.height),
        plain_text: decode_special_codes(&text.content),
        rich_text: None,
        wrap_width: None,
        font: Some(ctx.default_font.clone()),
        justification: 0,
    })
}

pub fn decode_special_codes(content: &str) -> String {
    let mut decoded = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '%' && chars.peek() == Some(&'%') {
            let mut ahead = chars.clone();
            ahead.next();
            if let Some(symbol) = ahead.next().and_then(special_code) {
                chars = ahead;
                decoded.push(symbol);
                continue;
            }
        }
        decoded.push(ch);
    }
    decoded
}

/// 目标文字转回多行文字。RTF 缺失、无法识别或与纯文本相同时使用纯文本。
pub fn text_to_source(text: &TextEntity, ctx: &ConversionContext) -> Result<MText, ConvertError> {
    check_height(text.height, "text")?;
    let contents = text
        .rich_text
        .as_deref()
        .filter(|rtf| *rtf != text.plain_text)
        .and_then(|rtf| parse_rtf(rtf, &ctx.default_font))
        .map(|rich| rich_to_mtext(&rich, &ctx.default_font))
        .unwrap_or_else(|| escape_mtext(&text.plain_text));

    Ok(MText {
        location: point_to_source(text.plane.origin, ctx),
        normal: text.plane.z_axis,
        direction: text.plane.x_axis,
        height: ctx.to_source(text.height),
        width: text.wrap_width.map(|width| ctx.to_source(width)),
        contents,
        attachment: text.justification,
        style_name: None,
    })
}
