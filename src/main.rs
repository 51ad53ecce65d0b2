//! NanoCalc 前端
//!
//! 主入口点：词法/语法分析命令行

mod config;
mod frontend;
mod lexer;
mod parser;

use std::env;
use std::fs;
use std::process;

use config::{LANG_NAME, SOURCE_EXTENSION, VERSION};
use frontend::Frontend;

/// 构建前端；规则表编译失败属于构建期缺陷，直接退出
fn build_frontend() -> Frontend {
    match Frontend::new() {
        Ok(frontend) => frontend,
        Err(e) => {
            eprintln!("[内部错误/Internal Error] {}", e);
            process::exit(1);
        }
    }
}

/// 读取源文件，检查扩展名
fn read_source(path: &str) -> String {
    let expected_ext = format!(".{}", SOURCE_EXTENSION);
    if !path.ends_with(&expected_ext) {
        eprintln!(
            "[参数错误/Invalid Argument] expected a .{} file: {}",
            SOURCE_EXTENSION, path
        );
        process::exit(1);
    }

    match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => {
            eprintln!("[文件错误/File Error] cannot read file: {}", path);
            process::exit(1);
        }
    }
}

/// 只做词法分析并打印 token 表
fn lex_file(path: &str) {
    let source = read_source(path);
    let frontend = build_frontend();

    match frontend.tokenize(&source) {
        Ok(tokens) => {
            println!("{:<14} {:<20} @ (line,col)", "TYPE", "VALUE");
            println!("{}", "-".repeat(60));
            for token in tokens {
                println!(
                    "{:<14} {:<20} @ ({},{})",
                    format!("{:?}", token.kind),
                    token.lexeme,
                    token.span.line,
                    token.span.column
                );
            }
        }
        Err(e) => {
            eprintln!("[编译错误/Compile Error] {}\n  {}", path, e);
            process::exit(1);
        }
    }
}

/// 解析文件，报告成功或第一个错误
fn parse_file(path: &str) {
    let source = read_source(path);
    let frontend = build_frontend();

    match frontend.parse(&source) {
        Ok(program) => {
            println!(
                "OK: parsed {} top-level statement(s), no faults found.",
                program.statements.len()
            );
        }
        Err(e) => {
            eprintln!("[编译错误/Compile Error] {}\n  {}", path, e);
            process::exit(1);
        }
    }
}

/// 解析文件并打印 AST
fn ast_file(path: &str) {
    let source = read_source(path);
    let frontend = build_frontend();

    match frontend.parse(&source) {
        Ok(program) => println!("{:#?}", program),
        Err(e) => {
            eprintln!("[编译错误/Compile Error] {}\n  {}", path, e);
            process::exit(1);
        }
    }
}

/// REPL 交互模式：逐行解析并打印 AST
fn repl() {
    use std::io::{self, Write};

    println!("{} {} REPL (front end)", LANG_NAME, VERSION);
    println!("Type 'exit' to quit.\n");

    let frontend = build_frontend();
    println!("{} built-in name(s) available to scripts.\n", frontend.builtins().len());

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        match frontend.parse(line) {
            Ok(program) => {
                for statement in &program.statements {
                    println!("{:#?}", statement);
                }
            }
            Err(e) => eprintln!("{}", e),
        }
    }
}

/// 打印帮助信息
fn print_help() {
    println!("{} front end {}", LANG_NAME, VERSION);
    println!();
    println!("Usage: nanocalc <command> [file.{}]", SOURCE_EXTENSION);
    println!();
    println!("Commands:");
    println!("  parse <file>   Parse a source file and report faults");
    println!("  lex <file>     Tokenize a source file and dump the token table");
    println!("  ast <file>     Parse a source file and dump the AST");
    println!("  repl           Start interactive mode");
    println!("  help           Show this help message");
    println!("  version        Show version information");
}

/// 打印版本信息
fn print_version() {
    println!("{} {}", LANG_NAME, VERSION);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let remaining: Vec<&str> = args[1..].iter().map(|s| s.as_str()).collect();

    match remaining.as_slice() {
        [] | ["repl"] => repl(),
        ["help"] | ["--help"] | ["-h"] => print_help(),
        ["version"] | ["--version"] | ["-v"] => print_version(),
        ["lex", path] => lex_file(path),
        ["ast", path] => ast_file(path),
        ["parse", path] => parse_file(path),
        [path] if path.ends_with(&format!(".{}", SOURCE_EXTENSION)) => parse_file(path),
        _ => {
            print_help();
            process::exit(1);
        }
    }
}
