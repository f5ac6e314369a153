// 集成测试：导入 -> 分章 -> 分页 -> 阅读位置的完整流程

#[cfg(test)]
mod integration_tests {
    use crate::*;
    use crate::model::ProgressEntry;
    use crate::parser::segment_document;
    use chrono::Utc;
    use std::sync::Arc;

    const GUTENBERG_HTML: &str = r#"
        <html>
        <head><title>A Tale</title></head>
        <body>
            <h1>A Tale</h1>
            <p>Transcriber's note: spelling kept as printed.</p>
            <h2>CONTENTS</h2>
            <h2>CHAPTER I.<br>The Arrival</h2>
            <p>The coach came in late that evening, and nobody was waiting at the inn.</p>
            <p>Rain fell on the yard while the horses were led away.</p>
            <h2>CHAPTER II.</h2>
            <blockquote><p>A letter, unsigned.</p></blockquote>
            <p>The morning brought a visitor with news from the city.</p>
        </body>
        </html>
    "#;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    /// 每个词 10 像素高
    fn word_measurer() -> Arc<dyn TextMeasurer> {
        Arc::new(|text: &str, _f: &FontDescriptor, _w: f32| {
            text.split_whitespace().count() as f32 * 10.0
        })
    }

    #[test]
    fn test_html_book_end_to_end() {
        let mut store = SqliteLibrary::open_in_memory().unwrap();
        let importer = Importer::default();
        let id = importer.import_text(&mut store, "A Tale", GUTENBERG_HTML).unwrap();

        let book = store.load_book(id).unwrap();
        let chapters = match &book.text {
            BookText::Chapters(chapters) => chapters.clone(),
            BookText::Flat(_) => panic!("expected segmented book"),
        };
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Introduction", "CHAPTER I. The Arrival", "CHAPTER II."]);
        assert_eq!(chapters[2].body.matches("A letter, unsigned.").count(), 1);

        let ctx = PaginationConfig::default().render_context(Viewport::new(360.0, 240.0));
        let measurer = Arc::new(HeuristicMeasurer::default());
        let session = ReaderSession::open(&store, id, ctx, measurer).unwrap();
        assert_eq!(session.position(), ReadingPosition::new(0, 0));
        assert!(session.page_count() >= 1);
    }

    #[test]
    fn test_flat_fallback_is_path_independent() {
        let config = SegmenterConfig::default();
        let plain = "It was a quiet year.\nNothing happened.";
        let html = "<html><body><p>It was a quiet year.</p><h2>Notes</h2><p>Nothing happened.</p></body></html>";

        assert!(segment_into_chapters("t", plain).is_empty());
        assert!(segment_into_chapters("t", html).is_empty());
        assert!(matches!(segment_document(&config, "t", html), Segmentation::Flat(_)));
    }

    #[test]
    fn test_plain_text_chapter_boundaries() {
        let chapters = segment_into_chapters(
            "Book",
            "Intro text.\nCHAPTER ONE\nFirst body.\nCHAPTER TWO\nSecond body.",
        );
        let pairs: Vec<(&str, &str)> = chapters
            .iter()
            .map(|c| (c.title.as_str(), c.body.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Introduction", "Intro text."),
                ("CHAPTER ONE", "First body."),
                ("CHAPTER TWO", "Second body."),
            ]
        );
    }

    #[test]
    fn test_saved_position_is_clamped_after_repagination() {
        let mut store = SqliteLibrary::open_in_memory().unwrap();
        let raw = format!(
            "CHAPTER 1\n{}\nCHAPTER 2\n{}\nCHAPTER 3\n{}",
            words(3),
            words(3),
            words(16)
        );
        let id = Importer::default().import_text(&mut store, "Book", &raw).unwrap();
        store
            .save_progress_entry(id, 2, Some(ProgressEntry { page: 9, updated_at: Utc::now() }))
            .unwrap();

        // 可用高度 40：每页 4 个词，第 3 章共 4 页
        let ctx = RenderContext::new(18.0, Viewport::new(200.0, 72.0), 16.0);
        let session = ReaderSession::open(&store, id, ctx, word_measurer()).unwrap();
        assert_eq!(session.page_count(), 4);
        assert_eq!(session.position(), ReadingPosition::new(2, 3));
    }

    #[test]
    fn test_font_change_repaginates_from_scratch() {
        let text = words(400);
        let m = HeuristicMeasurer::default();
        let viewport = Viewport::new(320.0, 480.0);

        let small = paginate(&text, 14.0, viewport, 16.0, &m);
        let large = paginate(&text, 22.0, viewport, 16.0, &m);
        assert!(large.len() > small.len());

        for (size, pages) in [(14.0, &small), (22.0, &large)] {
            let ctx = RenderContext::new(size, viewport, 16.0);
            let tokens: Vec<&str> = pages.iter().flat_map(|p| p.split_whitespace()).collect();
            assert_eq!(tokens.len(), 400);
            for page in pages.iter() {
                assert!(m.measure_height(page, &ctx.font, ctx.usable_width()) <= ctx.usable_height());
            }
        }
    }

    #[test]
    fn test_reimport_keeps_reading_position() {
        let mut store = SqliteLibrary::open_in_memory().unwrap();
        let importer = Importer::default();
        let raw = format!("CHAPTER 1\n{}\nCHAPTER 2\n{}", words(8), words(8));
        let id = importer.import_text(&mut store, "Book", &raw).unwrap();

        let ctx = RenderContext::new(18.0, Viewport::new(200.0, 72.0), 16.0);
        let mut session = ReaderSession::open(&store, id, ctx, word_measurer()).unwrap();
        session.next_chapter(&mut store).unwrap();
        session.next_page(&mut store).unwrap();
        assert_eq!(session.position(), ReadingPosition::new(1, 1));

        // 第 2 章变短，只剩 1 页
        let revised = format!("CHAPTER 1\n{}\nCHAPTER 2\n{}", words(8), words(2));
        assert!(importer.reimport(&mut store, id, &revised).unwrap());

        let session = ReaderSession::open(&store, id, ctx, word_measurer()).unwrap();
        assert_eq!(session.position(), ReadingPosition::new(1, 0));
    }

    #[test]
    fn test_configured_keyword_and_patterns() {
        let toml = r#"
            [segmenter]
            chapter_keyword = "Kapitel"
            extra_heading_patterns = ["第[一二三四五六七八九十]+章"]
        "#;
        let config = ReaderConfig::from_toml_str(toml).unwrap();
        let importer = Importer::new(config.segmenter);
        let mut store = SqliteLibrary::open_in_memory().unwrap();

        let raw = "Vorwort\nKAPITEL 1\nErster Teil.\n第二章 续\n第二部分。";
        let id = importer.import_text(&mut store, "Mixed", raw).unwrap();
        let book = store.load_book(id).unwrap();
        assert_eq!(book.text.chapter_count(), 3);
    }
}
