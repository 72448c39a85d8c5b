//! 包内路径工具
//!
//! EPUB包内的路径一律使用`/`分隔的相对路径（相对于OPF所在目录或压缩包根目录），
//! 这里的函数只做字符串层面的处理，不访问文件系统。

use percent_encoding::percent_decode_str;

/// 获取路径所在的目录（不含末尾的`/`）
///
/// `text/ch1.xhtml` -> `text`，`ch1.xhtml` -> ``
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// 拼接目录与相对路径
pub fn join(dir: &str, relative: &str) -> String {
    if dir.is_empty() {
        relative.to_string()
    } else if relative.is_empty() {
        dir.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), relative)
    }
}

/// 检查引用是否指向包外或只是片段（URL、绝对路径、`#id`、`mailto:`等）
pub fn is_external(reference: &str) -> bool {
    reference.is_empty()
        || reference.starts_with('#')
        || reference.starts_with('/')
        || reference.starts_with("//")
        || has_scheme(reference)
}

fn has_scheme(reference: &str) -> bool {
    match reference.find(':') {
        Some(idx) => {
            let scheme = &reference[..idx];
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        }
        None => false,
    }
}

/// 将相对引用按所在目录解析为包内路径，并规范化`.`和`..`
///
/// 越过包根目录的引用返回`None`。
///
/// ```
/// use epubmerge::epub::path::resolve;
/// assert_eq!(resolve("text", "../images/a.jpg"), Some("images/a.jpg".to_string()));
/// assert_eq!(resolve("", "./a.xhtml"), Some("a.xhtml".to_string()));
/// assert_eq!(resolve("", "../a.xhtml"), None);
/// ```
pub fn resolve(base_dir: &str, relative: &str) -> Option<String> {
    let mut components: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();

    for part in relative.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                components.pop()?;
            }
            other => components.push(other),
        }
    }

    if components.is_empty() {
        None
    } else {
        Some(components.join("/"))
    }
}

/// 计算从目录`from_dir`指向包内路径`target`的相对引用
///
/// ```
/// use epubmerge::epub::path::relative_to;
/// assert_eq!(relative_to("X/text", "X/images/a.jpg"), "../images/a.jpg");
/// assert_eq!(relative_to("X", "X/images/a.jpg"), "images/a.jpg");
/// ```
pub fn relative_to(from_dir: &str, target: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::with_capacity(from.len() - common + to.len() - common);
    parts.extend(std::iter::repeat_n("..", from.len() - common));
    parts.extend(&to[common..]);
    parts.join("/")
}

/// 对OPF中的href做百分号解码，得到压缩包内的实际文件名
pub fn decode_href(href: &str) -> String {
    percent_decode_str(href).decode_utf8_lossy().into_owned()
}

/// 由文件名生成可以安全用作目录名的命名空间标记
///
/// 路径分隔符、空白以及在URL中有特殊含义的字符都会替换为`_`，
/// 结果为空时使用`book`。
pub fn namespace_token(stem: &str) -> String {
    let token: String = stem
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '%' | '&' | '\'' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect();

    let token = token.trim_matches('.').to_string();
    if token.is_empty() {
        "book".to_string()
    } else {
        token
    }
}
