use bookweave::{LoadedBook, ReaderConfig, Result, SearchOutcome, UnifiedReader, Viewport, offset_to_position};
use clap::Parser;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::path::PathBuf;

/// 📚 bookweave - 电子书阅读引擎命令行工具
#[derive(Parser)]
#[command(name = "bookweave")]
#[command(about = "把EPUB与FB2电子书规范化为线性文本，并在终端中定位、折行与搜索")]
#[command(version)]
struct Args {
    /// 书籍文件路径
    #[arg(help = "要打开的EPUB或FB2文件路径", required_unless_present = "dump_config")]
    file: Option<PathBuf>,

    /// 折行宽度
    #[arg(short, long, help = "折行宽度（列），默认使用配置中的wrap_width")]
    width: Option<usize>,

    /// 视口高度
    #[arg(short, long, default_value = "20", help = "显示的行数")]
    lines: usize,

    /// 显示目录
    #[arg(short, long, help = "显示目录")]
    toc: bool,

    /// 显示章节索引
    #[arg(short, long, help = "显示章节列表及其偏移")]
    chapters: bool,

    /// 搜索词
    #[arg(short, long, help = "在全文中查找字面文本")]
    find: Option<String>,

    /// 重复查找次数
    #[arg(long, default_value = "1", help = "连续查找下一个匹配的次数")]
    repeat: usize,

    /// 跳转到目录项
    #[arg(short, long, help = "跳转到第N个目录项（从1开始）")]
    jump: Option<usize>,

    /// 配置文件路径
    #[arg(long, help = "YAML配置文件路径")]
    config: Option<PathBuf>,

    /// 输出配置
    #[arg(long, help = "输出当前生效的配置（YAML）后退出")]
    dump_config: bool,

    /// 日志详细程度
    #[arg(short, long, action = clap::ArgAction::Count, help = "输出更多日志（可重复，如 -vv）")]
    verbose: u8,
}

/// 写到stderr的日志实现，级别由 `log::max_level()` 控制
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        eprintln!("[{}] {}: {}", tag, record.target(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("❌ 错误: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = ReaderConfig::load_or_default(args.config.as_deref())?;

    if args.dump_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }
    let Some(path) = &args.file else {
        return Ok(());
    };

    println!("📚 bookweave - 正在打开: {}", path.display());
    let loaded = UnifiedReader::with_config(config.clone()).open(path)?;
    display_book_info(&loaded);

    if args.chapters {
        display_chapters(&loaded);
    }
    if args.toc {
        display_toc(&loaded);
    }

    let width = args.width.unwrap_or(config.wrap_width);
    let mut viewport = Viewport::new(loaded, config, width, args.lines);

    if let Some(index) = args.jump {
        match index.checked_sub(1).and_then(|i| viewport.jump_to_toc(i)) {
            Some(pos) => println!("\n🔖 跳转到目录项 {} (章节 {}, 偏移 {})", index, pos.chapter_index + 1, pos.offset_in_chapter),
            None => println!("\n⚠️  目录项 {} 不存在", index),
        }
    }

    if let Some(term) = &args.find {
        println!("\n🔍 查找 \"{}\":", term);
        let mut outcome = viewport.search(term, true);
        for round in 0..args.repeat.max(1) {
            if round > 0 {
                outcome = viewport.search_next();
            }
            report_search(&viewport, outcome);
            if !matches!(outcome, SearchOutcome::Found { .. }) {
                break;
            }
        }
    }

    display_viewport(&viewport);
    Ok(())
}

fn display_book_info(loaded: &LoadedBook) {
    let book = &loaded.book;
    println!("\n📖 书籍信息:");
    println!("  标题: {}", book.title);
    if !book.author.is_empty() {
        println!("  作者: {}", book.author);
    }
    println!("  格式: {}", loaded.format);
    println!("  标识: {}", book.id);
    println!("  章节数: {}", book.chapters.len());
    println!("  字符数: {}", book.total_characters);

    if !loaded.diagnostics.is_empty() {
        println!("\n⚠️  以下内容无法读取，已用空章节代替:");
        for diagnostic in &loaded.diagnostics {
            println!("  - {}", diagnostic);
        }
    }
}

fn display_chapters(loaded: &LoadedBook) {
    println!("\n📑 章节列表:");
    for chapter in &loaded.book.chapters {
        println!(
            "  {:>3}. {} [偏移 {}, 长度 {}]",
            chapter.index + 1,
            chapter.title,
            chapter.offset,
            chapter.length
        );
    }
}

fn display_toc(loaded: &LoadedBook) {
    println!("\n🌳 目录:");
    if loaded.toc.is_empty() {
        println!("  (空)");
        return;
    }
    for (i, entry) in loaded.toc.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, entry.label);
    }
}

fn report_search(viewport: &Viewport, outcome: SearchOutcome) {
    match outcome {
        SearchOutcome::Found { offset, .. } => {
            let pos = offset_to_position(&viewport.book().book, offset);
            println!("  ✅ 偏移 {} (章节 {}, 章内偏移 {})", offset, pos.chapter_index + 1, pos.offset_in_chapter);
        }
        other => println!("  {}", other),
    }
}

fn display_viewport(viewport: &Viewport) {
    println!("\n{}", "─".repeat(viewport.width().clamp(1, 120)));
    for line in viewport.visible_lines() {
        println!("{}", line);
    }
    println!("{}", "─".repeat(viewport.width().clamp(1, 120)));
    println!("{}", viewport.status_location());
}
