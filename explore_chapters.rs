//! 探索分章和分页结果
//!
//! 用法: explore_chapters <file> [width height]
//!
//! 读取文件、检测编码、分章，再用启发式测量给每一章分页并打印概况。
//! 当前目录下存在 conf/reader.toml 时使用其中的配置。

use lookup_reader_lib::config::load_config;
use lookup_reader_lib::pagination::{paginate, HeuristicMeasurer, Viewport};
use lookup_reader_lib::parser::{decode_text, detect_shape, Segmentation, Segmenter};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(file) = args.get(1) else {
        eprintln!("用法: {} <file> [width height]", args[0]);
        return;
    };
    let width = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(390.0);
    let height = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(700.0);

    let path = Path::new(file);
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("错误: 无法读取文件 {:?}: {}", path, e);
            return;
        }
    };

    let config = load_config(Path::new("conf/reader.toml"));
    let decoded = decode_text(&bytes);
    info!(encoding = decoded.encoding, had_errors = decoded.had_errors, "Decoded input");

    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled");
    println!("文件: {:?}", path);
    println!("形态: {:?}", detect_shape(&decoded.text));

    let ctx = config.pagination.render_context(Viewport::new(width, height));
    let measurer = HeuristicMeasurer::new(config.pagination.line_height);
    println!(
        "渲染上下文: {}pt {} / {}x{} / 留白 {}\n",
        ctx.font.size, ctx.font.family, width, height, ctx.padding
    );

    let segmenter = Segmenter::new(config.segmenter);
    match segmenter.segment(title, &decoded.text) {
        Segmentation::Chapters(chapters) => {
            println!("=== 章节 ({}) ===", chapters.len());
            for chapter in &chapters {
                let pages = paginate(&chapter.body, &ctx, &measurer);
                println!(
                    "  [{:>3}] {} ({} 字符, {} 页)",
                    chapter.index,
                    chapter.title,
                    chapter.body.chars().count(),
                    pages.len()
                );
            }
        }
        Segmentation::Flat(text) => {
            let pages = paginate(&text, &ctx, &measurer);
            println!("=== 平铺模式 ===");
            println!("  {} 字符, {} 页", text.chars().count(), pages.len());
            if let Some(first) = pages.first() {
                let preview: String = first.chars().take(120).collect();
                println!("  首页: {}", preview);
            }
        }
    }
}
