use std::{convert::TryFrom, path::Path};

use ficdl_common::{err, Conf, Context as _, Report, Uri};
use ficdl_core::{Chapter, HttpLoader, Story};

#[tracing::instrument(skip(conf, url), err)]
pub async fn run(conf: &Conf, url: &str) -> Result<(), Report> {
    let url = Uri::try_from(url).with_context(|| format!("invalid story url `{}`", url))?;

    let site = ficdl_ffn::site();
    let url = (site.canonical_url)(&url)
        .ok_or_else(|| err!("`{}` is not a {} story url", url, site.name))?;

    let loader = HttpLoader::new(conf.delay);

    tracing::info!(url = %url.to_string(), "downloading story");

    let story = Story::from_url(site, &loader, &url).await?;

    let out_dir = Path::new(&conf.output).join(story.slug());
    write_story(&story, &out_dir).await?;

    tracing::info!(
        title = %story.title(),
        chapters = story.chapters().len(),
        "story downloaded"
    );

    Ok(())
}

/// Writes the information page and one file per chapter under `out_dir`.
async fn write_story(story: &Story, out_dir: &Path) -> Result<(), Report> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("unable to create `{}`", out_dir.display()))?;

    let info_path = out_dir.join(story.info_filename());
    tokio::fs::write(&info_path, info_page(story))
        .await
        .with_context(|| format!("unable to write `{}`", info_path.display()))?;

    for (slot, chapter) in story.chapters().iter().enumerate() {
        let number = slot + 1;
        let path = out_dir.join(format!("chapter-{:04}.html", number));

        tracing::debug!(chapter = number, title = %chapter.title(), "writing chapter");

        tokio::fs::write(&path, chapter_page(story, chapter))
            .await
            .with_context(|| format!("unable to write `{}`", path.display()))?;
    }

    Ok(())
}

fn info_page(story: &Story) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n<pre>\n{description}</pre>\n</body>\n</html>\n",
        title = story.title(),
        description = story,
    )
}

fn chapter_page(story: &Story, chapter: &Chapter) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\">\
         <title>{story} - {title}</title></head>\n\
         <body>\n<h1>{title}</h1>\n{content}\n</body>\n</html>\n",
        story = story.title(),
        title = chapter.title(),
        content = chapter.content(),
    )
}
