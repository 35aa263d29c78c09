use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_profiles_table::Migration),
            Box::new(m20240601_000002_create_produtos_table::Migration),
            Box::new(m20240601_000003_create_movimentacoes_table::Migration),
            Box::new(m20240601_000004_create_revoked_tokens_table::Migration),
        ]
    }
}

mod m20240601_000001_create_profiles_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_profiles_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Profiles::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Profiles::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Profiles::Nome).string().not_null())
                        .col(
                            ColumnDef::new(Profiles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Profiles::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Profiles {
        Table,
        Id,
        Nome,
        CreatedAt,
    }
}

mod m20240601_000002_create_produtos_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_produtos_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Produtos::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Produtos::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Produtos::Nome).string_len(255).not_null())
                        .col(ColumnDef::new(Produtos::Descricao).text().null())
                        .col(ColumnDef::new(Produtos::Categoria).string().not_null())
                        .col(ColumnDef::new(Produtos::Material).string().not_null())
                        .col(ColumnDef::new(Produtos::Tamanho).string().null())
                        .col(ColumnDef::new(Produtos::Peso).decimal_len(12, 3).null())
                        .col(
                            ColumnDef::new(Produtos::QuantidadeEstoque)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Produtos::EstoqueMinimo)
                                .integer()
                                .not_null()
                                .default(10),
                        )
                        .col(
                            ColumnDef::new(Produtos::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Produtos::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_produtos_nome")
                        .table(Produtos::Table)
                        .col(Produtos::Nome)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Produtos::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Produtos {
        Table,
        Id,
        Nome,
        Descricao,
        Categoria,
        Material,
        Tamanho,
        Peso,
        QuantidadeEstoque,
        EstoqueMinimo,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000003_create_movimentacoes_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_movimentacoes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Movimentacoes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Movimentacoes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Movimentacoes::ProdutoId).uuid().not_null())
                        .col(ColumnDef::new(Movimentacoes::UsuarioId).uuid().not_null())
                        .col(ColumnDef::new(Movimentacoes::Tipo).string_len(10).not_null())
                        .col(ColumnDef::new(Movimentacoes::Quantidade).integer().not_null())
                        .col(ColumnDef::new(Movimentacoes::Observacao).text().null())
                        .col(
                            ColumnDef::new(Movimentacoes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movimentacoes_produto_id")
                                .from(Movimentacoes::Table, Movimentacoes::ProdutoId)
                                .to(Produtos::Table, Produtos::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movimentacoes_usuario_id")
                                .from(Movimentacoes::Table, Movimentacoes::UsuarioId)
                                .to(Profiles::Table, Profiles::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movimentacoes_created_at")
                        .table(Movimentacoes::Table)
                        .col(Movimentacoes::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movimentacoes_produto_id")
                        .table(Movimentacoes::Table)
                        .col(Movimentacoes::ProdutoId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Movimentacoes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Movimentacoes {
        Table,
        Id,
        ProdutoId,
        UsuarioId,
        Tipo,
        Quantidade,
        Observacao,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Produtos {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Profiles {
        Table,
        Id,
    }
}

mod m20240601_000004_create_revoked_tokens_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_revoked_tokens_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RevokedTokens::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RevokedTokens::Jti)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RevokedTokens::UsuarioId).string().not_null())
                        .col(
                            ColumnDef::new(RevokedTokens::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RevokedTokens::RevokedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RevokedTokens::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum RevokedTokens {
        Table,
        Jti,
        UsuarioId,
        ExpiresAt,
        RevokedAt,
    }
}
