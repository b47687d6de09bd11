//! Seed data script - fills the catalog with a handful of used books
//!
//! Run with: cargo run --bin seed-data -- --admin-email admin@sebo.com.br --admin-password ...
//!
//! Existing books are removed first unless `--keep-existing` is given.
//! Past order lines keep their price and lose the reference to removed books.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tracing::info;
use uuid::Uuid;

use bookshop_api::auth::password::hash_password;
use bookshop_api::entities::book::{self, BookCondition};
use bookshop_api::entities::user::{self, UserRole};

#[derive(Debug, Parser)]
#[command(name = "seed-data", about = "Populate the bookshop database with demo data")]
struct Args {
    /// Database to seed
    #[arg(long, env = "APP__DATABASE_URL", default_value = "sqlite://bookshop.db?mode=rwc")]
    database_url: String,

    /// Keep books that are already in the catalog
    #[arg(long)]
    keep_existing: bool,

    /// Also create (or promote) an administrator with this e-mail
    #[arg(long, requires = "admin_password")]
    admin_email: Option<String>,

    #[arg(long, env = "SEED_ADMIN_PASSWORD")]
    admin_password: Option<String>,

    #[arg(long, default_value = "Administrador")]
    admin_name: String,
}

struct SeedBook {
    title: &'static str,
    author: &'static str,
    price: Decimal,
    condition: BookCondition,
    category: &'static str,
    isbn: &'static str,
    cover: &'static str,
    description: &'static str,
    stock: i32,
    published_year: i32,
    weight_grams: i32,
}

fn catalog() -> Vec<SeedBook> {
    vec![
        SeedBook {
            title: "O Senhor dos Anéis: A Sociedade do Anel",
            author: "J.R.R. Tolkien",
            price: dec!(45.90),
            condition: BookCondition::Otimo,
            category: "Fantasia",
            isbn: "9788533613379",
            cover: "https://picsum.photos/seed/lotr1/400/600",
            description: "O primeiro volume da trilogia O Senhor dos Anéis, onde a jornada começa.",
            stock: 5,
            published_year: 1954,
            weight_grams: 300,
        },
        SeedBook {
            title: "1984",
            author: "George Orwell",
            price: dec!(29.90),
            condition: BookCondition::Bom,
            category: "Distopia",
            isbn: "9788535914849",
            cover: "https://picsum.photos/seed/1984/400/600",
            description: "Uma das obras mais influentes do século XX sobre vigilância e totalitarismo.",
            stock: 12,
            published_year: 1949,
            weight_grams: 250,
        },
        SeedBook {
            title: "Dom Casmurro",
            author: "Machado de Assis",
            price: dec!(15.00),
            condition: BookCondition::Regular,
            category: "Literatura Brasileira",
            isbn: "9788501012345",
            cover: "https://picsum.photos/seed/casmurro/400/600",
            description: "Capitu traiu ou não traiu Bentinho? O clássico da literatura nacional.",
            stock: 3,
            published_year: 1899,
            weight_grams: 200,
        },
        SeedBook {
            title: "Sapiens: Uma Breve História da Humanidade",
            author: "Yuval Noah Harari",
            price: dec!(55.00),
            condition: BookCondition::Otimo,
            category: "História",
            isbn: "9788525432187",
            cover: "https://picsum.photos/seed/sapiens/400/600",
            description: "Uma jornada fascinante pela história da nossa espécie.",
            stock: 8,
            published_year: 2011,
            weight_grams: 400,
        },
        SeedBook {
            title: "O Pequeno Príncipe",
            author: "Antoine de Saint-Exupéry",
            price: dec!(19.90),
            condition: BookCondition::Bom,
            category: "Infantil",
            isbn: "9788522031436",
            cover: "https://picsum.photos/seed/principe/400/600",
            description: "Uma história eterna sobre amizade, amor e perda.",
            stock: 20,
            published_year: 1943,
            weight_grams: 150,
        },
        SeedBook {
            title: "Cem Anos de Solidão",
            author: "Gabriel García Márquez",
            price: dec!(39.90),
            condition: BookCondition::Otimo,
            category: "Realismo Mágico",
            isbn: "9788501012051",
            cover: "https://picsum.photos/seed/solidao/400/600",
            description: "A obra-prima de García Márquez que narra a história da família Buendía.",
            stock: 6,
            published_year: 1967,
            weight_grams: 350,
        },
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    info!("=== Bookshop Seed Data ===");
    let db = bookshop_api::db::establish_connection(&args.database_url)
        .await
        .context("failed to connect to the database")?;
    bookshop_api::db::run_migrations(&db)
        .await
        .context("failed to run migrations")?;

    if !args.keep_existing {
        let removed = book::Entity::delete_many().exec(&db).await?.rows_affected;
        info!("Removed {} existing books", removed);
    }

    let books = catalog();
    let count = books.len();
    for seed in books {
        insert_book(&db, seed).await?;
    }
    info!("Imported {} books", count);

    if let (Some(email), Some(password)) = (args.admin_email, args.admin_password) {
        ensure_admin(&db, &email, &password, &args.admin_name).await?;
    }

    info!("=== Seed Data Complete ===");
    Ok(())
}

async fn insert_book(db: &DatabaseConnection, seed: SeedBook) -> anyhow::Result<()> {
    let now = Utc::now();
    book::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(seed.title.to_string()),
        author: Set(seed.author.to_string()),
        price: Set(seed.price),
        stock: Set(seed.stock),
        weight_grams: Set(seed.weight_grams),
        condition: Set(seed.condition),
        category: Set(seed.category.to_string()),
        isbn: Set(Some(seed.isbn.to_string())),
        cover_image: Set(Some(seed.cover.to_string())),
        description: Set(Some(seed.description.to_string())),
        published_year: Set(Some(seed.published_year)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .with_context(|| format!("failed to insert {}", seed.title))?;
    info!("  + {}", seed.title);
    Ok(())
}

async fn ensure_admin(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
    name: &str,
) -> anyhow::Result<()> {
    use sea_orm::{ColumnTrait, QueryFilter};

    let email = email.trim().to_lowercase();
    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?;

    if let Some(existing) = existing {
        let mut active: user::ActiveModel = existing.into();
        active.role = Set(UserRole::Admin);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        info!("Promoted {} to ADMIN", email);
        return Ok(());
    }

    let now = Utc::now();
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        email: Set(email.clone()),
        password_hash: Set(hash_password(password)?),
        role: Set(UserRole::Admin),
        phone: Set(None),
        cpf: Set(None),
        birthdate: Set(None),
        address_street: Set(None),
        address_number: Set(None),
        address_complement: Set(None),
        address_neighborhood: Set(None),
        address_city: Set(None),
        address_state: Set(None),
        address_zip: Set(None),
        preferences: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    info!("Created administrator {}", email);
    Ok(())
}
