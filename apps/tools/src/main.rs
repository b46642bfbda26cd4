use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use server_api::{
    create_article, increment_views, list_drafts, list_published, register_user, show_dashboard,
    ApiContext,
};
use shared::{
    domain::{ArticleId, UserId},
    error::{ApiError, ApiException},
    validation::ArticleForm,
};
use storage::{normalize_database_url, Storage, DEFAULT_DATABASE_URL};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scope {
    All,
    Published,
    Drafts,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateUser {
        username: String,
    },
    CreateArticle {
        #[arg(long)]
        author: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        excerpt: Option<String>,
        #[arg(long)]
        featured_image: Option<String>,
        #[arg(long, default_value = "draft")]
        status: String,
    },
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, value_enum, default_value_t = Scope::All)]
        scope: Scope,
    },
    BumpViews {
        article_id: i64,
    },
}

fn api_failure(err: ApiError) -> anyhow::Error {
    ApiException::from(err).into()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();
    let cli = Cli::parse();
    let database_url = normalize_database_url(&cli.database_url);
    let ctx = ApiContext::new(Storage::new(&database_url).await?);

    match cli.command {
        Command::CreateUser { username } => {
            let user_id = register_user(&ctx, &username).await.map_err(api_failure)?;
            println!("created user_id={user_id}");
        }
        Command::CreateArticle {
            author,
            title,
            content,
            excerpt,
            featured_image,
            status,
        } => {
            let form = ArticleForm {
                title: Some(title),
                excerpt,
                content: Some(content),
                featured_image,
                status: Some(status),
            };
            let created = create_article(&ctx, UserId(author), &form)
                .await
                .map_err(api_failure)?;
            println!(
                "created article_id={} slug={}",
                created.article.id, created.article.slug
            );
        }
        Command::List { page, scope } => {
            let view = match scope {
                Scope::All => show_dashboard(&ctx, page).await,
                Scope::Published => list_published(&ctx, page).await,
                Scope::Drafts => list_drafts(&ctx, page).await,
            }
            .map_err(api_failure)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::BumpViews { article_id } => {
            let updated = increment_views(&ctx, ArticleId(article_id))
                .await
                .map_err(api_failure)?;
            println!(
                "article_id={} views_count={}",
                updated.article_id, updated.views_count
            );
        }
    }

    Ok(())
}
