//! 依赖名称推断
//!
//! 当可调用对象没有显式声明依赖列表时，从其参数列表文本中推断依赖名称。
//! 这是一个尽力而为的后备机制：推荐通过 [`Function::new`](super::provider::Function::new)
//! 或 [`Constructible::dependencies`](super::provider::Constructible::dependencies) 显式声明依赖。
//!
//! 支持的写法：
//! - 闭包：`|config, logger|`、`|config: Arc<Config>, logger: Arc<Logger>|`
//! - 函数签名：`fn build(config: Arc<Config>, cache: HashMap<String, u32>)`
//! - 括号或裸列表：`(config, logger)`、`config, logger`
//!
//! 元组、结构体等解构模式不受支持。

/// 从参数列表文本推断依赖名称，按声明顺序返回。
///
/// 纯函数：跳过注释与空白，`mut`/`ref`/`&` 前缀被忽略，`self` 接收者不计入依赖。
pub fn infer_dependency_names(source: &str) -> Vec<String> {
    let source = strip_comments(source);
    split_top_level(parameter_list(&source))
        .into_iter()
        .filter_map(parameter_name)
        .collect()
}

/// 移除 `//` 行注释与（可嵌套的）`/* */` 块注释
fn strip_comments(source: &str) -> String {
    let mut output = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut block_depth = 0usize;

    while let Some(c) = chars.next() {
        if block_depth > 0 {
            match (c, chars.peek()) {
                ('*', Some('/')) => {
                    chars.next();
                    block_depth -= 1;
                    if block_depth == 0 {
                        output.push(' ');
                    }
                }
                ('/', Some('*')) => {
                    chars.next();
                    block_depth += 1;
                }
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        output.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                block_depth = 1;
            }
            _ => output.push(c),
        }
    }

    output
}

/// 定位参数列表：`|...|`、`(...)`，否则视整段文本为参数列表
fn parameter_list(source: &str) -> &str {
    let Some(open) = source.find(|c: char| c == '|' || c == '(') else {
        return source;
    };
    let opener = source.as_bytes()[open];
    let body_start = open + 1;
    let mut depth = 0usize;
    let mut previous = '\0';

    for (offset, c) in source[body_start..].char_indices() {
        match c {
            '|' if opener == b'|' && depth == 0 => return &source[body_start..body_start + offset],
            ')' if opener == b'(' && depth == 0 => return &source[body_start..body_start + offset],
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '>' if previous != '-' => depth = depth.saturating_sub(1),
            _ => {}
        }
        previous = c;
    }

    &source[body_start..]
}

/// 按顶层逗号切分，泛型、元组与函数指针类型中的逗号不参与切分
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut previous = '\0';

    for (index, c) in list.char_indices() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '>' if previous != '-' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..index]);
                start = index + 1;
            }
            _ => {}
        }
        previous = c;
    }
    parts.push(&list[start..]);

    parts
}

fn parameter_name(parameter: &str) -> Option<String> {
    let pattern = parameter.split(':').next().unwrap_or_default();
    let mut tokens = pattern
        .split(|c: char| c.is_whitespace() || c == '&')
        .filter(|token| !token.is_empty())
        .filter(|token| !matches!(*token, "mut" | "ref"));

    let name: String = tokens
        .next()?
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();

    if name.is_empty() || name == "self" {
        None
    } else {
        Some(name)
    }
}
