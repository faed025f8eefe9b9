use std::path::PathBuf;
use std::sync::Arc;

use admin_core::{
    filter_subscribers, subscribers_csv, ApiClient, ApiError, BlogImageUpload, BlogInput,
    BlogType, CategoryInput, Config, FileTokenStore, MemoryTokenStore, OrderUpdate,
    ProductImageUpload, ProductInput, Session, SubscriberCounts, TokenStore, UploadFile,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum ConsoleError {
    #[error("not logged in; run `admin-console login` first")]
    NotLoggedIn,
    #[error("no subscriber with id {0}")]
    NoSuchSubscriber(u64),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Parser, Debug)]
#[command(name = "admin-console", about = "Store administration from the terminal")]
struct Cli {
    /// Backend API root, including the `/api` prefix.
    #[arg(long, env = "ADMIN_API_URL")]
    base_url: Option<String>,

    /// File holding the access and refresh tokens between runs.
    #[arg(long, env = "ADMIN_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        username: String,
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami,
    Dashboard,
    Stats,
    Orders(OrdersCommand),
    Products(ProductsCommand),
    Categories(CategoriesCommand),
    Blogs(BlogsCommand),
    Subscribers(SubscribersCommand),
}

#[derive(Args, Debug)]
struct OrdersCommand {
    #[command(subcommand)]
    command: OrdersSubcommand,
}

#[derive(Subcommand, Debug)]
enum OrdersSubcommand {
    List,
    Show {
        id: u64,
    },
    Update {
        id: u64,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        is_paid: Option<bool>,
    },
    MarkPaid {
        id: u64,
    },
    MarkShipped {
        id: u64,
    },
}

#[derive(Args, Debug)]
struct ProductsCommand {
    #[command(subcommand)]
    command: ProductsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProductsSubcommand {
    List,
    Show {
        id: u64,
    },
    Create(ProductFields),
    Update {
        id: u64,
        #[command(flatten)]
        fields: ProductFields,
    },
    Delete {
        id: u64,
    },
    UploadImage {
        id: u64,
        file: PathBuf,
        #[arg(long)]
        color: String,
        #[arg(long, default_value = "")]
        alt_text: String,
        /// Replace existing images of the same color.
        #[arg(long, default_value_t = false)]
        clear_old: bool,
    },
    DeleteImage {
        image_id: u64,
    },
}

/// Product form fields. Unset flags are left out of the request body.
#[derive(Args, Debug, Default)]
struct ProductFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    slug: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    price: Option<String>,
    #[arg(long)]
    sku: Option<String>,
    #[arg(long)]
    stock: Option<i64>,
    #[arg(long)]
    is_active: Option<bool>,
    #[arg(long)]
    category: Option<u64>,
    #[arg(long)]
    discount_price: Option<String>,
}

impl From<ProductFields> for ProductInput {
    fn from(fields: ProductFields) -> Self {
        ProductInput {
            name: fields.name,
            slug: fields.slug,
            description: fields.description,
            price: fields.price,
            sku: fields.sku,
            stock: fields.stock,
            is_active: fields.is_active,
            category: fields.category,
            discount_price: fields.discount_price,
        }
    }
}

#[derive(Args, Debug)]
struct CategoriesCommand {
    #[command(subcommand)]
    command: CategoriesSubcommand,
}

#[derive(Subcommand, Debug)]
enum CategoriesSubcommand {
    List,
    Show {
        id: u64,
    },
    Create(CategoryFields),
    Update {
        id: u64,
        #[command(flatten)]
        fields: CategoryFields,
    },
    Delete {
        id: u64,
    },
}

#[derive(Args, Debug, Default)]
struct CategoryFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    slug: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    is_active: Option<bool>,
    /// Make this a subcategory of the given category.
    #[arg(long = "parent")]
    parent_category_id: Option<u64>,
}

impl From<CategoryFields> for CategoryInput {
    fn from(fields: CategoryFields) -> Self {
        CategoryInput {
            name: fields.name,
            slug: fields.slug,
            description: fields.description,
            is_active: fields.is_active,
            parent_category_id: fields.parent_category_id,
        }
    }
}

#[derive(Args, Debug)]
struct BlogsCommand {
    #[command(subcommand)]
    command: BlogsSubcommand,
}

#[derive(Subcommand, Debug)]
enum BlogsSubcommand {
    List,
    Show {
        id: u64,
    },
    Create(BlogFields),
    Update {
        id: u64,
        #[command(flatten)]
        fields: BlogFields,
    },
    Delete {
        id: u64,
    },
    UploadImage {
        id: u64,
        file: PathBuf,
        #[arg(long, default_value = "")]
        alt_text: String,
        #[arg(long, default_value_t = 0)]
        ordering: i64,
    },
    UploadFeatured {
        id: u64,
        file: PathBuf,
    },
    UploadPdf {
        id: u64,
        file: PathBuf,
        #[arg(long)]
        thumbnail: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BlogKind {
    Manual,
    Pdf,
}

impl From<BlogKind> for BlogType {
    fn from(kind: BlogKind) -> Self {
        match kind {
            BlogKind::Manual => BlogType::Manual,
            BlogKind::Pdf => BlogType::Pdf,
        }
    }
}

#[derive(Args, Debug, Default)]
struct BlogFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    slug: Option<String>,
    #[arg(long, value_enum)]
    blog_type: Option<BlogKind>,
    #[arg(long)]
    content: Option<String>,
    #[arg(long)]
    excerpt: Option<String>,
    #[arg(long)]
    is_published: Option<bool>,
}

impl From<BlogFields> for BlogInput {
    fn from(fields: BlogFields) -> Self {
        BlogInput {
            title: fields.title,
            slug: fields.slug,
            blog_type: fields.blog_type.map(BlogType::from),
            content: fields.content,
            excerpt: fields.excerpt,
            is_published: fields.is_published,
        }
    }
}

#[derive(Args, Debug)]
struct SubscribersCommand {
    #[command(subcommand)]
    command: SubscribersSubcommand,
}

#[derive(Subcommand, Debug)]
enum SubscribersSubcommand {
    List {
        /// Only show emails containing this text.
        #[arg(long)]
        search: Option<String>,
    },
    Toggle {
        id: u64,
    },
    Remove {
        id: u64,
    },
    ExportCsv {
        #[arg(long, default_value = "subscribers.csv")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), ConsoleError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let session = open_session(&cli);
    session.initialize().await;

    match cli.command {
        Command::Login { username, password } => {
            let user = session.login(&username, &password).await?;
            print_json(&serde_json::to_value(user)?)
        }
        Command::Logout => {
            session.logout();
            println!("logged out");
            Ok(())
        }
        Command::Whoami => print_json(&serde_json::to_value(session.snapshot())?),
        command => {
            if !session.is_authenticated() {
                return Err(ConsoleError::NotLoggedIn);
            }
            run_admin(session.client(), command).await
        }
    }
}

fn open_session(cli: &Cli) -> Session {
    let mut config = Config::from_env();
    if let Some(base_url) = &cli.base_url {
        config.base_url.clone_from(base_url);
    }
    if let Some(token_file) = &cli.token_file {
        config.token_file = Some(token_file.clone());
    }

    let tokens: Arc<dyn TokenStore> = match &config.token_file {
        Some(path) => Arc::new(FileTokenStore::new(path)),
        None => {
            warn!("no config directory; tokens will not outlive this run");
            Arc::new(MemoryTokenStore::new())
        }
    };
    Session::new(ApiClient::from_config(&config, tokens))
}

async fn run_admin(client: &ApiClient, command: Command) -> Result<(), ConsoleError> {
    match command {
        Command::Dashboard => print_json(&serde_json::to_value(client.dashboard().await?)?),
        Command::Stats => print_json(&serde_json::to_value(client.admin_stats().await?)?),
        Command::Orders(orders) => run_orders(client, orders).await,
        Command::Products(products) => run_products(client, products).await,
        Command::Categories(categories) => run_categories(client, categories).await,
        Command::Blogs(blogs) => run_blogs(client, blogs).await,
        Command::Subscribers(subscribers) => run_subscribers(client, subscribers).await,
        Command::Login { .. } | Command::Logout | Command::Whoami => Ok(()),
    }
}

async fn run_orders(client: &ApiClient, orders: OrdersCommand) -> Result<(), ConsoleError> {
    let json = match orders.command {
        OrdersSubcommand::List => serde_json::to_value(client.list_orders().await?)?,
        OrdersSubcommand::Show { id } => serde_json::to_value(client.get_order(id).await?)?,
        OrdersSubcommand::Update {
            id,
            status,
            is_paid,
        } => {
            let update = OrderUpdate { status, is_paid };
            serde_json::to_value(client.update_order(id, &update).await?)?
        }
        OrdersSubcommand::MarkPaid { id } => {
            serde_json::to_value(client.mark_order_paid(id).await?)?
        }
        OrdersSubcommand::MarkShipped { id } => {
            serde_json::to_value(client.mark_order_shipped(id).await?)?
        }
    };
    print_json(&json)
}

async fn run_products(client: &ApiClient, products: ProductsCommand) -> Result<(), ConsoleError> {
    match products.command {
        ProductsSubcommand::List => print_json(&serde_json::to_value(client.list_products().await?)?),
        ProductsSubcommand::Show { id } => {
            print_json(&serde_json::to_value(client.get_product(id).await?)?)
        }
        ProductsSubcommand::Create(fields) => {
            let product = client.create_product(&fields.into()).await?;
            print_json(&serde_json::to_value(product)?)
        }
        ProductsSubcommand::Update { id, fields } => {
            let product = client.update_product(id, &fields.into()).await?;
            print_json(&serde_json::to_value(product)?)
        }
        ProductsSubcommand::Delete { id } => {
            client.delete_product(id).await?;
            println!("deleted product {id}");
            Ok(())
        }
        ProductsSubcommand::UploadImage {
            id,
            file,
            color,
            alt_text,
            clear_old,
        } => {
            let mut upload = ProductImageUpload::new(UploadFile::from_path(&file).await?, color);
            upload.alt_text = alt_text;
            upload.clear_old = clear_old;
            print_json(&client.upload_product_image(id, upload).await?)
        }
        ProductsSubcommand::DeleteImage { image_id } => {
            client.delete_product_image(image_id).await?;
            println!("deleted image {image_id}");
            Ok(())
        }
    }
}

async fn run_categories(
    client: &ApiClient,
    categories: CategoriesCommand,
) -> Result<(), ConsoleError> {
    match categories.command {
        CategoriesSubcommand::List => {
            print_json(&serde_json::to_value(client.list_categories().await?)?)
        }
        CategoriesSubcommand::Show { id } => {
            print_json(&serde_json::to_value(client.get_category(id).await?)?)
        }
        CategoriesSubcommand::Create(fields) => {
            let category = client.create_category(&fields.into()).await?;
            print_json(&serde_json::to_value(category)?)
        }
        CategoriesSubcommand::Update { id, fields } => {
            let category = client.update_category(id, &fields.into()).await?;
            print_json(&serde_json::to_value(category)?)
        }
        CategoriesSubcommand::Delete { id } => {
            client.delete_category(id).await?;
            println!("deleted category {id}");
            Ok(())
        }
    }
}

async fn run_blogs(client: &ApiClient, blogs: BlogsCommand) -> Result<(), ConsoleError> {
    match blogs.command {
        BlogsSubcommand::List => print_json(&serde_json::to_value(client.list_blogs().await?)?),
        BlogsSubcommand::Show { id } => print_json(&serde_json::to_value(client.get_blog(id).await?)?),
        BlogsSubcommand::Create(fields) => {
            let blog = client.create_blog(&fields.into()).await?;
            print_json(&serde_json::to_value(blog)?)
        }
        BlogsSubcommand::Update { id, fields } => {
            let blog = client.update_blog(id, &fields.into()).await?;
            print_json(&serde_json::to_value(blog)?)
        }
        BlogsSubcommand::UploadImage {
            id,
            file,
            alt_text,
            ordering,
        } => {
            let mut upload = BlogImageUpload::new(UploadFile::from_path(&file).await?);
            upload.alt_text = alt_text;
            upload.ordering = ordering;
            print_json(&client.upload_blog_image(id, upload).await?)
        }
        BlogsSubcommand::Delete { id } => {
            client.delete_blog(id).await?;
            println!("deleted blog {id}");
            Ok(())
        }
        BlogsSubcommand::UploadFeatured { id, file } => {
            let image = UploadFile::from_path(&file).await?;
            print_json(&client.upload_blog_featured_image(id, image).await?)
        }
        BlogsSubcommand::UploadPdf {
            id,
            file,
            thumbnail,
        } => {
            let pdf = UploadFile::from_path(&file).await?;
            let thumbnail = match thumbnail {
                Some(path) => Some(UploadFile::from_path(&path).await?),
                None => None,
            };
            print_json(&client.upload_blog_pdf(id, pdf, thumbnail).await?)
        }
    }
}

async fn run_subscribers(
    client: &ApiClient,
    subscribers: SubscribersCommand,
) -> Result<(), ConsoleError> {
    match subscribers.command {
        SubscribersSubcommand::List { search } => {
            let all = client.list_subscribers().await?;
            let shown = filter_subscribers(&all, search.as_deref().unwrap_or(""));
            let counts = SubscriberCounts::from(all.as_slice());
            print_json(&serde_json::json!({
                "counts": counts,
                "subscribers": shown,
            }))
        }
        SubscribersSubcommand::Toggle { id } => {
            let current = client
                .list_subscribers()
                .await?
                .into_iter()
                .find(|s| s.id == id)
                .map(|s| s.is_active)
                .ok_or(ConsoleError::NoSuchSubscriber(id))?;
            print_json(&serde_json::to_value(client.toggle_subscriber(id, current).await?)?)
        }
        SubscribersSubcommand::Remove { id } => {
            client.unsubscribe(id).await?;
            println!("removed subscriber {id}");
            Ok(())
        }
        SubscribersSubcommand::ExportCsv { output } => {
            let all = client.list_subscribers().await?;
            std::fs::write(&output, subscribers_csv(&all)).map_err(|source| ConsoleError::Write {
                path: output.clone(),
                source,
            })?;
            println!("wrote {} subscribers to {}", all.len(), output.display());
            Ok(())
        }
    }
}

fn print_json(value: &Value) -> Result<(), ConsoleError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_order_command() {
        let cli = Cli::try_parse_from(["admin-console", "orders", "mark-paid", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Orders(OrdersCommand {
                command: OrdersSubcommand::MarkPaid { id: 5 }
            })
        ));
    }

    #[test]
    fn upload_image_requires_color() {
        let result = Cli::try_parse_from([
            "admin-console",
            "products",
            "upload-image",
            "1",
            "mug.png",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn product_update_sends_only_given_fields() {
        let cli = Cli::try_parse_from([
            "admin-console",
            "products",
            "update",
            "3",
            "--stock",
            "40",
            "--is-active",
            "false",
        ])
        .unwrap();
        let Command::Products(ProductsCommand {
            command: ProductsSubcommand::Update { id, fields },
        }) = cli.command
        else {
            panic!("parsed wrong command");
        };
        assert_eq!(id, 3);
        let body = serde_json::to_value(ProductInput::from(fields)).unwrap();
        assert_eq!(body, serde_json::json!({ "stock": 40, "is_active": false }));
    }

    #[test]
    fn category_create_takes_parent() {
        let cli = Cli::try_parse_from([
            "admin-console",
            "categories",
            "create",
            "--name",
            "Travel Mugs",
            "--parent",
            "1",
        ])
        .unwrap();
        let Command::Categories(CategoriesCommand {
            command: CategoriesSubcommand::Create(fields),
        }) = cli.command
        else {
            panic!("parsed wrong command");
        };
        let input = CategoryInput::from(fields);
        assert_eq!(input.name.as_deref(), Some("Travel Mugs"));
        assert_eq!(input.parent_category_id, Some(1));
    }

    #[test]
    fn blog_type_flag_maps_to_wire_value() {
        let cli = Cli::try_parse_from([
            "admin-console",
            "blogs",
            "create",
            "--title",
            "Manual",
            "--blog-type",
            "pdf",
        ])
        .unwrap();
        let Command::Blogs(BlogsCommand {
            command: BlogsSubcommand::Create(fields),
        }) = cli.command
        else {
            panic!("parsed wrong command");
        };
        let body = serde_json::to_value(BlogInput::from(fields)).unwrap();
        assert_eq!(body["blog_type"], "pdf");
    }

    #[test]
    fn missing_subscriber_is_reported() {
        assert_eq!(
            ConsoleError::NoSuchSubscriber(9).to_string(),
            "no subscriber with id 9"
        );
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "admin-console",
            "--base-url",
            "http://shop.test/api",
            "--token-file",
            "/tmp/admin-tokens.json",
            "whoami",
        ])
        .unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://shop.test/api"));
        assert_eq!(cli.token_file, Some(PathBuf::from("/tmp/admin-tokens.json")));
    }
}
