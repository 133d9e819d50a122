use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use docbridge_core::bson::{self, oid::ObjectId, Bson, Document};
use docbridge_core::{logging, ClientConfig, DocumentStoreClient, FindOptions, Identifier, LogLevel};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "docbridge")]
#[command(about = "docbridge CLI - id-oriented CRUD against a MongoDB database")]
#[command(version)]
struct Cli {
    /// MongoDB connection string
    #[arg(long, global = true, env = "DOCBRIDGE_URL")]
    url: Option<String>,
    /// Database name
    #[arg(long, global = true, env = "DOCBRIDGE_DATABASE")]
    database: Option<String>,
    /// Field used for id lookups
    #[arg(long, global = true, env = "DOCBRIDGE_ID_FIELD")]
    id_field: Option<String>,
    /// JSON config file; url, database and id field from flags or the
    /// environment still take precedence over it
    #[arg(long, global = true, env = "DOCBRIDGE_CONFIG")]
    config: Option<PathBuf>,
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, env = "DOCBRIDGE_LOG_LEVEL", default_value = "warn")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum IdType {
    String,
    Int,
    ObjectId,
}

#[derive(Args, Clone, Copy, Debug)]
struct IdArgs {
    /// How to parse the id argument
    #[arg(long, value_enum, default_value = "string")]
    id_type: IdType,
    /// Parse the id as an i64 (short for --id-type int)
    #[arg(long, conflicts_with = "id_type")]
    int_id: bool,
}

impl IdArgs {
    fn kind(&self) -> IdType {
        if self.int_id {
            IdType::Int
        } else {
            self.id_type
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server is reachable
    Ping,
    /// Insert one JSON document
    Insert {
        collection: String,
        /// Document as a JSON object
        json: String,
    },
    /// Fetch a document by id
    Get {
        collection: String,
        id: String,
        #[command(flatten)]
        id_args: IdArgs,
    },
    /// Find documents matching a filter
    Find {
        collection: String,
        /// Filter as a JSON object
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        skip: Option<u64>,
        /// Sort field; prefix with '-' for descending
        #[arg(long)]
        sort: Option<String>,
    },
    /// Set fields on a document by id
    Update {
        collection: String,
        id: String,
        /// Fields to set, as a JSON object
        json: String,
        #[command(flatten)]
        id_args: IdArgs,
    },
    /// Delete a document by id
    Delete {
        collection: String,
        id: String,
        #[command(flatten)]
        id_args: IdArgs,
    },
    /// Count documents matching a filter
    Count {
        collection: String,
        #[arg(long)]
        filter: Option<String>,
    },
    /// Import data from JSON file into database
    Import {
        /// JSON file: { "collection": [documents...], ... }
        file: PathBuf,
    },
    /// Export database to JSON file
    Export {
        /// Output JSON file
        file: PathBuf,
        /// Export only specific collection
        #[arg(long)]
        collection: Option<String>,
    },
    /// Create an index on the id field
    Index {
        collection: String,
        #[arg(long)]
        unique: bool,
    },
    /// Drop the whole database
    DropDatabase {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let config = build_config(&cli)?;
    let client = DocumentStoreClient::new(config)
        .await
        .context("Failed to create client")?;

    let outcome = run(&client, cli.command).await;
    client.close().await;
    outcome
}

fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => ClientConfig::from_env().context("Invalid DOCBRIDGE_* environment")?,
    };

    if let Some(url) = &cli.url {
        config.connection_url = url.clone();
    }
    if let Some(database) = &cli.database {
        config.database_name = database.clone();
    }
    if let Some(field) = &cli.id_field {
        config.id_field = field.clone();
    }
    Ok(config)
}

async fn run(client: &DocumentStoreClient, command: Commands) -> Result<()> {
    match command {
        Commands::Ping => {
            client.ping().await.context("Ping failed")?;
            let info = client.connection_info();
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Insert { collection, json } => {
            let doc = parse_document(&json)?;
            let result = client
                .insert_one(&collection, &doc)
                .await
                .with_context(|| format!("Failed to insert document into {}", collection))?;
            println!("Inserted {}", bson_to_json(result.inserted_id));
        }
        Commands::Get {
            collection,
            id,
            id_args,
        } => {
            let id = parse_id(&id, id_args.kind())?;
            let found: Option<Document> = client
                .find_by_id(&collection, id.clone())
                .await
                .with_context(|| format!("Failed to query collection: {}", collection))?;
            match found {
                Some(doc) => println!("{}", serde_json::to_string_pretty(&document_to_json(doc))?),
                None => println!("No document with {} = {}", client.id_field(), id),
            }
        }
        Commands::Find {
            collection,
            filter,
            limit,
            skip,
            sort,
        } => {
            let filter = parse_filter(filter.as_deref())?;
            let mut options = FindOptions::new();
            if let Some(limit) = limit {
                options = options.with_limit(limit);
            }
            if let Some(skip) = skip {
                options = options.with_skip(skip);
            }
            if let Some(sort) = sort {
                options = options.with_sort(vec![parse_sort(&sort)]);
            }
            let docs: Vec<Document> = client
                .find_many(&collection, filter, Some(options))
                .await
                .with_context(|| format!("Failed to query collection: {}", collection))?;
            let values: Vec<Value> = docs.into_iter().map(document_to_json).collect();
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        Commands::Update {
            collection,
            id,
            json,
            id_args,
        } => {
            let id = parse_id(&id, id_args.kind())?;
            let fields = parse_document(&json)?;
            let result = client
                .update_by_id(&collection, id, &fields)
                .await
                .with_context(|| format!("Failed to update document in {}", collection))?;
            println!(
                "Matched {}, modified {}",
                result.matched_count, result.modified_count
            );
        }
        Commands::Delete {
            collection,
            id,
            id_args,
        } => {
            let id = parse_id(&id, id_args.kind())?;
            let result = client
                .delete_by_id(&collection, id)
                .await
                .with_context(|| format!("Failed to delete document from {}", collection))?;
            println!("Deleted {}", result.deleted_count);
        }
        Commands::Count { collection, filter } => {
            let filter = parse_filter(filter.as_deref())?;
            let count = client
                .count(&collection, filter)
                .await
                .with_context(|| format!("Failed to count documents in {}", collection))?;
            println!("{}", count);
        }
        Commands::Import { file } => import_data(client, &file).await?,
        Commands::Export { file, collection } => {
            export_data(client, &file, collection.as_deref()).await?
        }
        Commands::Index { collection, unique } => {
            let name = client
                .create_id_index(&collection, unique)
                .await
                .with_context(|| format!("Failed to create index on {}", collection))?;
            println!("Index '{}' ready on {}", name, collection);
        }
        Commands::DropDatabase { yes } => {
            if !yes {
                bail!(
                    "Refusing to drop database '{}' without --yes",
                    client.database_name()
                );
            }
            client.drop_database().await.context("Failed to drop database")?;
            println!("Dropped database '{}'", client.database_name());
        }
    }
    Ok(())
}

/// Import data from JSON file
/// Format: { "collection_name": [documents...], ... }
async fn import_data(client: &DocumentStoreClient, file: &Path) -> Result<()> {
    let batches = read_import_file(file)?;
    let mut total_docs = 0;

    for (collection_name, docs) in batches {
        if docs.is_empty() {
            println!("Skipping empty collection '{}'", collection_name);
            continue;
        }
        client
            .insert_many(&collection_name, &docs)
            .await
            .with_context(|| format!("Failed to insert documents into {}", collection_name))?;
        total_docs += docs.len();

        println!(
            "Imported {} documents into '{}'",
            docs.len(),
            collection_name
        );
    }

    println!(
        "Total: {} documents imported to {}",
        total_docs,
        client.database_name()
    );
    Ok(())
}

fn read_import_file(file: &Path) -> Result<Vec<(String, Vec<Document>)>> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    let data: Map<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in file: {}", file.display()))?;

    let mut batches = Vec::with_capacity(data.len());
    for (collection_name, documents) in data {
        let docs = documents
            .as_array()
            .with_context(|| format!("Collection '{}' must be an array", collection_name))?;

        let docs = docs
            .iter()
            .map(json_to_document)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Invalid document in '{}'", collection_name))?;
        batches.push((collection_name, docs));
    }
    Ok(batches)
}

/// Export database to JSON file
async fn export_data(
    client: &DocumentStoreClient,
    file: &Path,
    collection_filter: Option<&str>,
) -> Result<()> {
    let collections = match collection_filter {
        Some(name) => vec![name.to_string()],
        None => client
            .list_collections()
            .await
            .context("Failed to list collections")?,
    };

    let mut output: Map<String, Value> = Map::new();
    let mut total_docs = 0;

    for coll_name in collections {
        let docs: Vec<Document> = client
            .find_many(&coll_name, Document::new(), None)
            .await
            .with_context(|| format!("Failed to query collection: {}", coll_name))?;

        println!("Exporting {} documents from '{}'", docs.len(), coll_name);
        total_docs += docs.len();
        output.insert(
            coll_name,
            Value::Array(docs.into_iter().map(document_to_json).collect()),
        );
    }

    let json =
        serde_json::to_string_pretty(&output).with_context(|| "Failed to serialize to JSON")?;

    fs::write(file, json)
        .with_context(|| format!("Failed to write to file: {}", file.display()))?;

    println!(
        "Total: {} documents exported to {}",
        total_docs,
        file.display()
    );
    Ok(())
}

fn parse_id(raw: &str, id_type: IdType) -> Result<Identifier> {
    match id_type {
        IdType::String => Ok(Identifier::from(raw)),
        IdType::Int => raw
            .trim()
            .parse::<i64>()
            .map(Identifier::from)
            .with_context(|| format!("'{}' is not an integer id", raw)),
        IdType::ObjectId => ObjectId::parse_str(raw.trim())
            .map(Identifier::from)
            .with_context(|| format!("'{}' is not an ObjectId", raw)),
    }
}

fn parse_document(json: &str) -> Result<Document> {
    let value: Value = serde_json::from_str(json).with_context(|| "Invalid JSON")?;
    json_to_document(&value)
}

fn parse_filter(json: Option<&str>) -> Result<Document> {
    match json {
        Some(json) => parse_document(json),
        None => Ok(Document::new()),
    }
}

/// "name" → ("name", 1), "-age" → ("age", -1)
fn parse_sort(arg: &str) -> (String, i32) {
    match arg.strip_prefix('-') {
        Some(field) => (field.to_string(), -1),
        None => (arg.to_string(), 1),
    }
}

fn json_to_document(value: &Value) -> Result<Document> {
    if !value.is_object() {
        bail!("Document must be an object");
    }
    Ok(bson::to_document(value)?)
}

fn document_to_json(doc: Document) -> Value {
    Bson::Document(doc).into_relaxed_extjson()
}

fn bson_to_json(value: Bson) -> Value {
    value.into_relaxed_extjson()
}
