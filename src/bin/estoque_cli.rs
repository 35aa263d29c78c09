use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use estoque_api::{
    auth::{AuthConfig, AuthError, AuthService, Session, SessionUser, UNAUTHENTICATED_MESSAGE},
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::produto,
    forms::{MovementForm, ProductForm},
    handlers::AppServices,
    screen::{Resolution, Screen, ScreenState},
    services::{
        dashboard::DashboardSummary,
        movement_ledger::{MovementQuery, MovementView, MOVEMENT_RECORDED},
        product_catalog::{
            Confirmation, ProductView, DELETE_PROMPT, PRODUCT_CREATED, PRODUCT_DELETED,
            PRODUCT_UPDATED,
        },
    },
    stock,
};
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::debug;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Auth(command) => handle_auth_command(&context, command, cli.json).await?,
        Commands::Produtos(command) => handle_produtos_command(&context, command, cli.json).await?,
        Commands::Movimentacoes(command) => {
            handle_movimentacoes_command(&context, command, cli.json).await?
        }
        Commands::Dashboard(args) => handle_dashboard(&context, args, cli.json).await?,
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "estoque", about = "Estoque CLI: catalog, movements and dashboard", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Auth(AuthCommands),
    #[command(subcommand)]
    Produtos(ProdutosCommands),
    #[command(subcommand)]
    Movimentacoes(MovimentacoesCommands),
    /// Stock alerts and this month's totals
    Dashboard(DashboardArgs),
    /// Apply the embedded database migrations
    Migrate,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Validate a token from the identity provider and save it as the session
    Login(AuthLoginArgs),
    /// Show the saved session
    Whoami,
    /// Sign out ("Sair"): revoke the saved token and clear the session file
    Logout,
}

#[derive(Args)]
struct AuthLoginArgs {
    #[arg(long, help = "Bearer token issued by the identity provider")]
    token: String,
}

#[derive(Subcommand)]
enum ProdutosCommands {
    List,
    Create(ProductArgs),
    Update(UpdateProductArgs),
    Delete(DeleteProductArgs),
}

#[derive(Args)]
struct ProductArgs {
    #[arg(long)]
    nome: String,
    #[arg(long, default_value = "")]
    descricao: String,
    #[arg(long)]
    categoria: String,
    #[arg(long)]
    material: String,
    #[arg(long, default_value = "")]
    tamanho: String,
    #[arg(long, default_value = "", help = "Weight; accepts 1.5 or 1,5")]
    peso: String,
    #[arg(long, default_value = "10")]
    estoque_minimo: String,
}

impl From<ProductArgs> for ProductForm {
    fn from(args: ProductArgs) -> Self {
        Self {
            nome: args.nome,
            descricao: args.descricao,
            categoria: args.categoria,
            material: args.material,
            tamanho: args.tamanho,
            peso: args.peso,
            estoque_minimo: args.estoque_minimo,
        }
    }
}

#[derive(Args)]
struct UpdateProductArgs {
    id: Uuid,
    #[command(flatten)]
    fields: ProductArgs,
}

#[derive(Args)]
struct DeleteProductArgs {
    id: Uuid,
    #[arg(long, action = ArgAction::SetTrue, help = "Skip the confirmation prompt")]
    yes: bool,
}

#[derive(Subcommand)]
enum MovimentacoesCommands {
    List(ListMovementsArgs),
    Create(CreateMovementArgs),
}

#[derive(Args)]
struct ListMovementsArgs {
    #[arg(long, help = "Number of movements to show (1-200)")]
    limit: Option<u64>,
    #[arg(long, help = "Only movements at or after this RFC 3339 instant")]
    desde: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct CreateMovementArgs {
    #[arg(long)]
    produto: String,
    #[arg(long, default_value = "entrada", help = "entrada | saida")]
    tipo: String,
    #[arg(long)]
    quantidade: String,
    #[arg(long, default_value = "")]
    observacao: String,
}

#[derive(Args)]
struct DashboardArgs {
    #[arg(long, value_name = "SECS", help = "Refresh every SECS seconds until Ctrl+C")]
    watch: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    user: SessionUser,
    saved_at: DateTime<Utc>,
}

struct CliContext {
    db: Arc<DbPool>,
    auth_service: Arc<AuthService>,
    services: AppServices,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config: AppConfig = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);

        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&config), db.clone()));
        let services = AppServices::new(db.clone(), &config);

        Ok(Self {
            db,
            auth_service,
            services,
        })
    }

    /// Session from the saved token. No file means anonymous; a stale token is an error.
    async fn session(&self) -> Result<Session> {
        let Some((path, stored)) = read_session()? else {
            return Ok(Session::Anonymous);
        };

        let user = self
            .auth_service
            .session_from_token(&stored.access_token)
            .await
            .with_context(|| {
                format!(
                    "saved session in {} is no longer valid; run `estoque-cli auth login`",
                    path.display()
                )
            })?;
        Ok(Session::Authenticated(user))
    }
}

async fn handle_auth_command(context: &CliContext, command: AuthCommands, json: bool) -> Result<()> {
    match command {
        AuthCommands::Login(args) => handle_auth_login(context, args, json).await,
        AuthCommands::Whoami => handle_auth_whoami(json),
        AuthCommands::Logout => handle_auth_logout(context).await,
    }
}

async fn handle_auth_login(context: &CliContext, args: AuthLoginArgs, json: bool) -> Result<()> {
    let user = context
        .auth_service
        .session_from_token(args.token.trim())
        .await
        .context("failed to validate token")?;

    let path = session_file_path()
        .ok_or_else(|| anyhow!("no HOME or ESTOQUE_CLI_HOME to store the session in"))?;
    let stored = StoredSession {
        access_token: args.token.trim().to_string(),
        user,
        saved_at: Utc::now(),
    };
    save_session(&path, &stored)?;

    if json {
        print_json(&stored.user)?;
    } else {
        println!("Authenticated as {}", stored.user.display_name());
        println!("Session saved to: {}", path.display());
    }
    Ok(())
}

fn handle_auth_whoami(json: bool) -> Result<()> {
    let (path, stored) = read_session()?.ok_or_else(missing_session)?;

    if json {
        print_json(&stored.user)?;
    } else {
        println!("User: {} ({})", stored.user.display_name(), stored.user.user_id);
        if let Some(email) = stored.user.email.as_ref() {
            println!("Email: {}", email);
        }
        println!("Expires at: {}", stored.user.expires_at.to_rfc3339());
        println!("Loaded from session: {}", path.display());
    }
    Ok(())
}

async fn handle_auth_logout(context: &CliContext) -> Result<()> {
    let (path, stored) = read_session()?.ok_or_else(missing_session)?;

    match context.auth_service.session_from_token(&stored.access_token).await {
        Ok(user) => context
            .auth_service
            .revoke(&user)
            .await
            .context("failed to revoke session token")?,
        Err(AuthError::RevokedToken | AuthError::TokenExpired) => {
            debug!("saved token already unusable; clearing the session file only");
        }
        Err(err) => return Err(err).context("failed to validate saved token"),
    }

    clear_session_file(&path)?;
    println!("Signed out; cleared {}", path.display());
    Ok(())
}

async fn handle_produtos_command(
    context: &CliContext,
    command: ProdutosCommands,
    json: bool,
) -> Result<()> {
    let catalog = &context.services.product_catalog;

    match command {
        ProdutosCommands::List => {
            let products: Vec<ProductView> = catalog
                .list_products()
                .await
                .context("failed to list products")?
                .into_iter()
                .map(ProductView::from)
                .collect();

            if json {
                print_json(&products)?;
            } else if products.is_empty() {
                println!("Nenhum produto cadastrado.");
            } else {
                products.iter().for_each(render_product);
            }
        }
        ProdutosCommands::Create(args) => {
            let session = context.session().await?;
            let payload = ProductForm::from(args).into_payload()?;
            let product = catalog
                .create_product(&session, payload)
                .await
                .context("failed to create product")?;
            render_written_product(product, PRODUCT_CREATED, json)?;
        }
        ProdutosCommands::Update(args) => {
            let session = context.session().await?;
            let payload = ProductForm::from(args.fields).into_payload()?;
            let product = catalog
                .update_product(&session, args.id, payload)
                .await
                .with_context(|| format!("failed to update product {}", args.id))?;
            render_written_product(product, PRODUCT_UPDATED, json)?;
        }
        ProdutosCommands::Delete(args) => {
            let session = context.session().await?;
            session.require_user()?;

            let confirmed = args.yes || prompt_confirmation(DELETE_PROMPT)?;
            if !confirmed {
                println!("Exclusão cancelada.");
                return Ok(());
            }

            catalog
                .delete_product(&session, args.id, Confirmation::Confirmed)
                .await
                .with_context(|| format!("failed to delete product {}", args.id))?;

            if json {
                print_json(&serde_json::json!({ "id": args.id, "message": PRODUCT_DELETED }))?;
            } else {
                println!("{}", PRODUCT_DELETED);
            }
        }
    }

    Ok(())
}

async fn handle_movimentacoes_command(
    context: &CliContext,
    command: MovimentacoesCommands,
    json: bool,
) -> Result<()> {
    let ledger = &context.services.movement_ledger;

    match command {
        MovimentacoesCommands::List(args) => {
            let movements = ledger
                .list_movements(MovementQuery {
                    limit: args.limit,
                    desde: args.desde,
                })
                .await
                .context("failed to list movements")?;

            if json {
                print_json(&movements)?;
            } else if movements.is_empty() {
                println!("Nenhuma movimentação registrada.");
            } else {
                movements.iter().for_each(render_movement);
            }
        }
        MovimentacoesCommands::Create(args) => {
            let session = context.session().await?;
            let payload = MovementForm {
                produto_id: args.produto,
                tipo: args.tipo,
                quantidade: args.quantidade,
                observacao: args.observacao,
            }
            .into_payload()?;

            let recorded = ledger
                .record_movement(&session, payload)
                .await
                .context("failed to record movement")?;

            if json {
                print_json(&recorded)?;
            } else {
                println!("{}", MOVEMENT_RECORDED);
                render_movement(&recorded.movimentacao);
                println!("Estoque atual: {}", recorded.quantidade_estoque);
            }
        }
    }

    Ok(())
}

async fn handle_dashboard(context: &CliContext, args: DashboardArgs, json: bool) -> Result<()> {
    let dashboard = context.services.dashboard.clone();

    let Some(secs) = args.watch else {
        let summary = dashboard
            .dashboard_summary()
            .await
            .context("failed to load dashboard")?;
        return render_dashboard(&summary, json);
    };

    let mut screen: Screen<DashboardSummary> = Screen::new();
    let (tx, mut rx) = mpsc::channel(8);
    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(ticket) = screen.begin_refresh() else {
                    debug!("previous dashboard fetch still running; skipping tick");
                    continue;
                };
                let dashboard = dashboard.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = dashboard.dashboard_summary().await;
                    // Receiver gone means the screen was closed
                    let _ = tx.send((ticket, result)).await;
                });
            }
            Some((ticket, result)) = rx.recv() => {
                if screen.resolve(ticket, result) == Resolution::Stale {
                    continue;
                }
                match screen.state() {
                    ScreenState::Loaded(summary) => render_dashboard(summary, json)?,
                    ScreenState::Errored(message) => eprintln!("{}", message),
                    ScreenState::Loading => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                screen.deactivate();
                break;
            }
        }
    }

    Ok(())
}

fn missing_session() -> anyhow::Error {
    anyhow::Error::new(AuthError::MissingAuth).context(UNAUTHENTICATED_MESSAGE)
}

/// Asks `prompt [s/N]` on stdin. Only an explicit yes confirms.
fn prompt_confirmation(prompt: &str) -> Result<bool> {
    print!("{} [s/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "s" | "sim" | "y" | "yes"
    )
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_written_product(product: produto::Model, message: &str, json: bool) -> Result<()> {
    let view = ProductView::from(product);
    if json {
        print_json(&view)?;
    } else {
        println!("{}", message);
        render_product(&view);
    }
    Ok(())
}

fn render_product(product: &ProductView) {
    let alert = if product.abaixo_minimo { " • ABAIXO DO MÍNIMO" } else { "" };
    println!(
        "- {} • {} • {} • {} • {}{}",
        product.id,
        product.nome,
        product.categoria,
        product.material,
        stock::stock_label(product.quantidade_estoque, product.estoque_minimo),
        alert
    );
}

fn render_movement(movement: &MovementView) {
    println!(
        "- {} • {} • {} • {} • por {}{}",
        movement.criado_em_formatado,
        movement.tipo,
        movement.quantidade,
        movement.produto_nome,
        movement.usuario_nome,
        movement
            .observacao
            .as_deref()
            .map(|obs| format!(" • {}", obs))
            .unwrap_or_default()
    );
}

fn render_dashboard(summary: &DashboardSummary, json: bool) -> Result<()> {
    if json {
        return print_json(summary);
    }

    println!("Total de produtos: {}", summary.total_produtos);
    println!("Abaixo do mínimo:  {}", summary.abaixo_minimo);
    println!("Entradas no mês:   {}", summary.entradas_mes);
    println!("Saídas no mês:     {}", summary.saidas_mes);
    if summary.alertas.is_empty() {
        println!("Nenhum produto abaixo do estoque mínimo.");
    } else {
        println!("Alertas:");
        for alert in &summary.alertas {
            println!("  - {} • {}", alert.nome, alert.rotulo);
        }
    }
    Ok(())
}

fn session_file_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("ESTOQUE_CLI_HOME") {
        let mut path = PathBuf::from(dir);
        path.push("session.json");
        return Some(path);
    }

    std::env::var("HOME").ok().map(|home| {
        let mut path = PathBuf::from(home);
        path.push(".estoque");
        path.push("session.json");
        path
    })
}

fn save_session(path: &Path, session: &StoredSession) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }

    let payload = serde_json::to_vec_pretty(session)?;
    fs::write(path, payload).with_context(|| format!("failed writing {}", path.display()))?;
    Ok(())
}

fn read_session() -> Result<Option<(PathBuf, StoredSession)>> {
    match session_file_path() {
        Some(path) => load_session(&path).map(|found| found.map(|s| (path, s))),
        None => Ok(None),
    }
}

fn load_session(path: &Path) -> Result<Option<StoredSession>> {
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read session file {}", path.display()))?;
    let session: StoredSession = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse session file {}", path.display()))?;
    Ok(Some(session))
}

fn clear_session_file(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn only_explicit_yes_confirms() {
        for yes in ["s", "S", "sim\n", " yes ", "y"] {
            assert!(is_affirmative(yes), "{yes:?} should confirm");
        }
        for no in ["", "\n", "n", "nao", "não", "talvez"] {
            assert!(!is_affirmative(no), "{no:?} should cancel");
        }
    }

    #[test]
    fn session_file_round_trip_and_clear() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");
        assert!(load_session(&path).unwrap().is_none());

        let stored = StoredSession {
            access_token: "token".into(),
            user: SessionUser {
                user_id: Uuid::new_v4(),
                nome: Some("Ana".into()),
                email: None,
                token_id: "jti".into(),
                expires_at: Utc::now(),
            },
            saved_at: Utc::now(),
        };
        save_session(&path, &stored).unwrap();

        let loaded = load_session(&path).unwrap().unwrap();
        assert_eq!(loaded.user, stored.user);
        assert_eq!(loaded.access_token, "token");

        clear_session_file(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn delete_parses_yes_flag() {
        let cli = Cli::try_parse_from([
            "estoque",
            "produtos",
            "delete",
            "6b1f5e2c-7c3d-4d1e-9a55-1c2b3d4e5f60",
            "--yes",
        ])
        .unwrap();
        match cli.command {
            Commands::Produtos(ProdutosCommands::Delete(args)) => assert!(args.yes),
            _ => panic!("expected produtos delete"),
        }
    }
}
