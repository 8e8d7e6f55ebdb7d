//! Gazeta.ru article scraper.
//!
//! The navigation control lists the news feed as its second item and the
//! rubrics as menu items. Article paths on rubric pages carry an extra
//! leading rubric segment that the canonical article URL does not have.

use scraper::{ElementRef, Html};
use url::Url;

use crate::errors::SourceError;
use crate::scrapers::site::{
    ArticleLink, ArticlePage, Category, SiteLayout, element_text, selector, text_without,
};
use crate::utils::resolve_link;

/// Menu entries that are not news rubrics.
const SKIPPED_CATEGORIES: [&str; 8] = [
    "Цивилизация",
    "Спецпроекты",
    "Редакция",
    "Тесты",
    "Эксклюзивы",
    "Инфографика",
    "Фото",
    "Мнения",
];

/// Link classes of "more" buttons and compact teasers in rubric listings.
const SKIPPED_LINK_CLASSES: [&str; 2] = ["m_simple", "b_newslist-showmorebtn"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Gazeta;

/// `/politics/news/2026/10/16/1.shtml` becomes `/news/2026/10/16/1.shtml`.
fn strip_rubric_segment(href: &str) -> String {
    match href.strip_prefix('/') {
        Some(path) => match path.split_once('/') {
            Some((_, rest)) => format!("/{rest}"),
            None => "/".to_string(),
        },
        None => href.to_string(),
    }
}

impl SiteLayout for Gazeta {
    fn name(&self) -> &'static str {
        "gazeta"
    }

    fn home(&self) -> &'static str {
        "https://www.gazeta.ru/"
    }

    fn categories(&self, html: &str, base: &Url) -> Result<Vec<Category>, SourceError> {
        let document = Html::parse_document(html);
        let Some(control) = document.select(&selector("div.b_control")?).next() else {
            return Ok(Vec::new());
        };

        let category = |a: ElementRef<'_>, href: &str| -> Result<Category, SourceError> {
            Ok(Category {
                name: element_text(a),
                link: resolve_link(base, href)?,
            })
        };

        let mut categories = Vec::new();
        if let Some(feed) = control.select(&selector("a.b_nav-item[href]")?).nth(1) {
            if let Some(href) = feed.value().attr("href") {
                categories.push(category(feed, href)?);
            }
        }

        let menu_link = selector("a[href]")?;
        for item in control.select(&selector("div.b_menu-item")?) {
            let Some(a) = item.select(&menu_link).next() else {
                continue;
            };
            if SKIPPED_CATEGORIES.contains(&element_text(a).as_str()) {
                continue;
            }
            let Some(href) = a.value().attr("href") else {
                continue;
            };
            // The lifestyle rubric moved; the menu still links the old path.
            let href = if href == "/lifestyle/" { "/style/" } else { href };
            categories.push(category(a, href)?);
        }
        Ok(categories)
    }

    fn article_links(&self, html: &str, base: &Url) -> Result<Vec<ArticleLink>, SourceError> {
        let document = Html::parse_document(html);
        let columns: Vec<_> = document.select(&selector("div.w_col4")?).collect();
        let anchors = selector("a[href]")?;
        // With several columns the first one is the rubric's pinned block.
        let skip = usize::from(columns.len() > 1);

        let mut out = Vec::new();
        for column in columns.into_iter().skip(skip) {
            let rows = column
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|e| e.value().classes().any(|c| c == "row"));
            for row in rows {
                for a in row.select(&anchors) {
                    if a.value().classes().any(|c| SKIPPED_LINK_CLASSES.contains(&c)) {
                        continue;
                    }
                    let Some(href) = a.value().attr("href") else {
                        continue;
                    };
                    out.push(ArticleLink {
                        link: resolve_link(base, &strip_rubric_segment(href))?,
                        title: None,
                    });
                }
            }
        }
        Ok(out)
    }

    fn article(&self, html: &str) -> Result<ArticlePage, SourceError> {
        let document = Html::parse_document(html);

        let h1 = selector("h1.headline")?;
        let h2 = selector("h2.headline")?;
        let title = document
            .select(&h1)
            .next()
            .or_else(|| document.select(&h2).next())
            .map(element_text)
            .filter(|t| !t.is_empty());

        let published_at = document
            .select(&selector("div.breadcrumb time")?)
            .next()
            .map(element_text)
            .unwrap_or_default();

        let mut parts = Vec::new();
        if let Some(intro) = document.select(&selector("div.b_article-intro")?).next() {
            parts.push(element_text(intro));
        }
        if let Some(text) = document.select(&selector("div.b_article-text")?).next() {
            let incuts = [selector("div.b_article-incut")?, selector("aside.b_article-incut")?];
            parts.push(text_without(text, &incuts));
        }
        parts.retain(|p| !p.is_empty());

        Ok(ArticlePage {
            title,
            published_at,
            body_text: parts.join(" "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse(Gazeta.home()).unwrap()
    }

    #[test]
    fn test_categories_from_navigation_control() {
        let html = r#"
            <div class="b_control">
              <a class="b_nav-item" href="/">Главная</a>
              <a class="b_nav-item" href="/news/">Новости</a>
              <div class="b_menu-item"><a href="/politics/">Политика</a></div>
              <div class="b_menu-item"><a href="/photo/">Фото</a></div>
              <div class="b_menu-item"><a href="/lifestyle/">Стиль</a></div>
              <div class="b_menu-item"><a href="https://www.gazeta.ru/tech/">Наука</a></div>
            </div>"#;
        let categories = Gazeta.categories(html, &base()).unwrap();
        let pairs: Vec<_> = categories
            .iter()
            .map(|c| (c.name.as_str(), c.link.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Новости", "https://www.gazeta.ru/news/"),
                ("Политика", "https://www.gazeta.ru/politics/"),
                ("Стиль", "https://www.gazeta.ru/style/"),
                ("Наука", "https://www.gazeta.ru/tech/"),
            ]
        );
    }

    #[test]
    fn test_article_links_skip_pinned_column_and_buttons() {
        let html = r#"
            <div class="w_col4"><div class="row"><a href="/politics/news/2026/10/16/pinned.shtml">P</a></div></div>
            <div class="w_col4">
              <div class="row">
                <a class="b_ear" href="/politics/news/2026/10/16/1.shtml">Один</a>
                <a class="m_simple" href="/politics/news/2026/10/16/2.shtml">Два</a>
              </div>
              <div class="row"><a href="https://www.gazeta.ru/politics/2026/10/16/3.shtml">Три</a></div>
              <div class="row"><a class="b_newslist-showmorebtn" href="/politics/news/">Ещё</a></div>
              <div class="wrap"><div class="row"><a href="/nested/x.shtml">нет</a></div></div>
            </div>"#;
        let links: Vec<_> = Gazeta
            .article_links(html, &base())
            .unwrap()
            .into_iter()
            .map(|l| l.link)
            .collect();
        assert_eq!(
            links,
            vec![
                "https://www.gazeta.ru/news/2026/10/16/1.shtml",
                "https://www.gazeta.ru/politics/2026/10/16/3.shtml",
            ]
        );
    }

    #[test]
    fn test_strip_rubric_segment() {
        assert_eq!(strip_rubric_segment("/politics/news/1.shtml"), "/news/1.shtml");
        assert_eq!(strip_rubric_segment("/politics"), "/");
        assert_eq!(strip_rubric_segment("https://www.gazeta.ru/a/b"), "https://www.gazeta.ru/a/b");
    }

    #[test]
    fn test_article_page() {
        let html = r#"
            <div class="breadcrumb"><a href="/politics/">Политика</a><time datetime="2026-10-16">16 октября 2026, 14:32</time></div>
            <h2 class="headline">Госдума приняла закон</h2>
            <div class="b_article-intro">Вводный абзац.</div>
            <div class="b_article-text">
              <p>Основной текст.</p>
              <div class="b_article-incut">Читайте также</div>
              <aside class="b_article-incut">Реклама</aside>
              <p>Окончание.</p>
            </div>"#;
        let page = Gazeta.article(html).unwrap();
        assert_eq!(page.title.as_deref(), Some("Госдума приняла закон"));
        assert_eq!(page.published_at, "16 октября 2026, 14:32");
        assert_eq!(page.body_text, "Вводный абзац. Основной текст. Окончание.");
    }
}
