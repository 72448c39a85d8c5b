use std::path::{Path, PathBuf};

use clap::Parser;
use epubmerge::config::DEFAULT_OUTPUT;
use epubmerge::{MergeConfig, Merger, Ncx, Result, SourceBook, Staging, Strategy};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// 📚 epubmerge - EPUB合并工具
#[derive(Parser)]
#[command(name = "epubmerge")]
#[command(about = "把多个EPUB文件按顺序合并为一个")]
#[command(version)]
struct Args {
    /// 要合并的EPUB文件，按阅读顺序排列
    #[arg(help = "要合并的EPUB文件路径（按顺序）")]
    inputs: Vec<PathBuf>,

    /// 输出文件名
    #[arg(short, long, default_value = DEFAULT_OUTPUT, help = "输出文件名，缺少.epub后缀时自动补上")]
    output: PathBuf,

    /// 合并策略
    #[arg(short, long, value_enum, help = "合并策略（默认full-preserve）")]
    strategy: Option<Strategy>,

    /// 合并后的书名
    #[arg(long, help = "合并后的书名")]
    title: Option<String>,

    /// 合并后的语言
    #[arg(long, help = "合并后的语言代码")]
    language: Option<String>,

    /// 配置文件
    #[arg(short, long, help = "YAML配置文件路径")]
    config: Option<PathBuf>,

    /// 生成默认配置文件
    #[arg(long, value_name = "PATH", help = "把默认配置写入指定文件后退出")]
    init_config: Option<PathBuf>,

    /// 查看模式
    #[arg(long, help = "不合并，只显示每个输入文件的结构信息")]
    inspect: bool,

    /// 详细输出模式
    #[arg(short, long, help = "显示详细日志")]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let result = if let Some(path) = &args.init_config {
        MergeConfig::generate_default_config(path).map(|_| println!("已生成配置文件: {}", path.display()))
    } else if args.inspect {
        inspect_all(&args.inputs, args.verbose)
    } else {
        run_merge(&args)
    };

    if let Err(e) = result {
        eprintln!("❌ 错误: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "epubmerge=debug" } else { "epubmerge=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &Args) -> Result<MergeConfig> {
    let mut config = match &args.config {
        Some(path) => MergeConfig::from_file(path)?,
        None => MergeConfig::default(),
    };
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(title) = &args.title {
        config.title = title.clone();
    }
    if let Some(language) = &args.language {
        config.language = language.clone();
    }
    Ok(config)
}

fn run_merge(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let summary = Merger::new(config).merge(&args.inputs, &args.output)?;

    println!("🎉 {}", summary.message());
    if args.verbose {
        println!("  策略: {}", summary.strategy);
        println!("  源文件: {} 个", summary.books);
        println!("  清单项目: {} 个", summary.items);
        if summary.pages > 0 {
            println!("  页数: {}", summary.pages);
        }
    }
    Ok(())
}

fn inspect_all(inputs: &[PathBuf], verbose: bool) -> Result<()> {
    if inputs.is_empty() {
        return Err(epubmerge::EpubError::NoSources);
    }
    let staging = Staging::new()?;
    for input in inputs {
        inspect(input, &staging, verbose)?;
    }
    Ok(())
}

/// 显示一个EPUB文件的容器、包文件与NCX信息
fn inspect(path: &Path, staging: &Staging, verbose: bool) -> Result<()> {
    let book = epubmerge::open(path, staging)?;

    println!("\n📦 {}", path.display());
    println!("  📚 主OPF文件路径: {}", book.opf_path);
    println!("  📖 EPUB版本: {}", book.opf.version);

    let (title, authors) = book.get_book_info();
    println!("  标题: {}", title);
    if !authors.is_empty() {
        println!("  作者: {}", authors.join(", "));
    }
    if let Some(language) = book.metadata().language() {
        println!("  语言: {}", language);
    }
    for identifier in book.metadata().identifiers() {
        println!("  标识符: {}", identifier.value);
    }
    if let Some(modified) = book.metadata().modified() {
        println!("  🕐 最后修改: {}", modified);
    }

    println!("\n  📁 文件统计:");
    println!("    清单项目: {} 个", book.manifest().len());
    let linear = book.spine().iter().filter(|item| item.is_linear()).count();
    println!("    脊柱项目: {} 个 (线性 {} 个)", book.spine().len(), linear);
    println!("    内容文档: {} 个", book.content_documents().count());
    if let Some(nav_path) = book.opf.get_nav_path() {
        println!("    导航文档: {}", nav_path);
    }
    if verbose {
        for item in book.manifest() {
            println!("      {} -> {} ({})", item.id, item.href, item.media_type);
        }
    }

    if let Some(ncx_path) = book.opf.get_ncx_path() {
        display_ncx(&book, &ncx_path, verbose)?;
    }
    Ok(())
}

fn display_ncx(book: &SourceBook, ncx_path: &str, verbose: bool) -> Result<()> {
    let ncx = Ncx::parse(&book.read_resource(ncx_path)?)?;

    println!("\n  🧭 NCX导航信息:");
    if let Some(uid) = ncx.get_uid() {
        println!("    唯一标识符: {}", uid);
    }
    if let Some(total_pages) = ncx.metadata.total_page_count {
        println!("    总页数: {}", total_pages);
    }
    if let Some(max_page) = ncx.metadata.max_page_number {
        println!("    最大页码: {}", max_page);
    }

    let nav_points = ncx.get_all_nav_points();
    println!("    导航点总数: {}", nav_points.len());
    if verbose {
        for nav_point in &nav_points {
            println!(
                "      {}. {} -> {}",
                nav_point.play_order, nav_point.nav_label.text, nav_point.content.src
            );
        }
    }

    if let Some(page_list) = ncx.get_page_list() {
        println!("    📄 页面目标数: {}", page_list.page_targets.len());
    }
    Ok(())
}
