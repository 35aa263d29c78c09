//! Text-input forms and the normalisation rules every write path shares.
//!
//! Forms hold raw strings as typed by an operator (CLI flags, form fields).
//! Converting one yields the typed payload the services accept.

use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::entities::MovementKind;
use crate::errors::ServiceError;
use crate::services::movement_ledger::MovementPayload;
use crate::services::product_catalog::{ProductPayload, DEFAULT_ESTOQUE_MINIMO};

pub fn normalize_string(value: String) -> String {
    value.trim().to_string()
}

pub fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .and_then(|v| if v.is_empty() { None } else { Some(v) })
}

fn invalid(field: &str, raw: &str) -> ServiceError {
    ServiceError::ValidationError(format!("{field}: valor numérico inválido \"{raw}\""))
}

fn negative(field: &str) -> ServiceError {
    ServiceError::ValidationError(format!("{field} não pode ser negativo"))
}

/// Optional decimal; accepts `1.5` and `1,5`. Empty input is absent.
pub fn parse_optional_decimal(field: &str, raw: &str) -> Result<Option<Decimal>, ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = Decimal::from_str(&trimmed.replace(',', ".")).map_err(|_| invalid(field, raw))?;
    if value < Decimal::ZERO {
        return Err(negative(field));
    }
    Ok(Some(value))
}

/// Required non-negative integer
pub fn parse_non_negative_int(field: &str, raw: &str) -> Result<i32, ServiceError> {
    let value: i32 = raw.trim().parse().map_err(|_| invalid(field, raw))?;
    if value < 0 {
        return Err(negative(field));
    }
    Ok(value)
}

/// Product form as typed; every field is text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductForm {
    pub nome: String,
    pub descricao: String,
    pub categoria: String,
    pub material: String,
    pub tamanho: String,
    pub peso: String,
    pub estoque_minimo: String,
}

impl Default for ProductForm {
    fn default() -> Self {
        Self {
            nome: String::new(),
            descricao: String::new(),
            categoria: String::new(),
            material: String::new(),
            tamanho: String::new(),
            peso: String::new(),
            estoque_minimo: DEFAULT_ESTOQUE_MINIMO.to_string(),
        }
    }
}

impl ProductForm {
    /// Parses numbers and normalises text. Text validation is left to the payload.
    pub fn into_payload(self) -> Result<ProductPayload, ServiceError> {
        let peso = parse_optional_decimal("peso", &self.peso)?;
        let estoque_minimo = if self.estoque_minimo.trim().is_empty() {
            DEFAULT_ESTOQUE_MINIMO
        } else {
            parse_non_negative_int("estoque_minimo", &self.estoque_minimo)?
        };

        Ok(ProductPayload {
            nome: self.nome,
            descricao: Some(self.descricao),
            categoria: self.categoria,
            material: self.material,
            tamanho: Some(self.tamanho),
            peso,
            estoque_minimo,
        }
        .normalized())
    }
}

/// Movement form as typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementForm {
    pub produto_id: String,
    pub tipo: String,
    pub quantidade: String,
    pub observacao: String,
}

impl Default for MovementForm {
    fn default() -> Self {
        Self {
            produto_id: String::new(),
            tipo: MovementKind::Entrada.to_string(),
            quantidade: String::new(),
            observacao: String::new(),
        }
    }
}

impl MovementForm {
    pub fn into_payload(self) -> Result<MovementPayload, ServiceError> {
        let produto_id = Uuid::parse_str(self.produto_id.trim()).map_err(|_| {
            ServiceError::ValidationError("Selecione um produto válido".to_string())
        })?;

        let tipo = match self.tipo.trim() {
            "" => MovementKind::default(),
            raw => MovementKind::from_str(&raw.to_lowercase()).map_err(|_| {
                ServiceError::ValidationError(format!(
                    "tipo deve ser \"entrada\" ou \"saida\", recebido \"{raw}\""
                ))
            })?,
        };

        let quantidade: i32 = self
            .quantidade
            .trim()
            .parse()
            .map_err(|_| invalid("quantidade", &self.quantidade))?;

        Ok(MovementPayload {
            produto_id,
            tipo,
            quantidade,
            observacao: normalize_optional_string(Some(self.observacao)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use rstest::rstest;

    fn form() -> ProductForm {
        ProductForm {
            nome: " Serrote ".into(),
            categoria: "Ferramentas manuais".into(),
            material: "Aço carbono".into(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_match_the_screen() {
        let f = ProductForm::default();
        assert_eq!(f.estoque_minimo, "10");
        assert_eq!(MovementForm::default().tipo, "entrada");
    }

    #[test]
    fn empty_optionals_become_absent() {
        let payload = form().into_payload().unwrap();
        assert_eq!(payload.nome, "Serrote");
        assert_eq!(payload.descricao, None);
        assert_eq!(payload.tamanho, None);
        assert_eq!(payload.peso, None);
        assert_eq!(payload.estoque_minimo, 10);
    }

    #[rstest]
    #[case("1.25", Some(dec!(1.25)))]
    #[case("1,25", Some(dec!(1.25)))]
    #[case("  ", None)]
    #[case("0", Some(dec!(0)))]
    fn peso_parsing(#[case] raw: &str, #[case] expected: Option<Decimal>) {
        let payload = ProductForm {
            peso: raw.into(),
            ..form()
        }
        .into_payload()
        .unwrap();
        assert_eq!(payload.peso, expected);
    }

    #[rstest]
    #[case("abc", "")]
    #[case("-2", "")]
    #[case("", "x")]
    #[case("", "-1")]
    #[case("", "2.5")]
    fn bad_numbers_are_validation_errors(#[case] peso: &str, #[case] minimo: &str) {
        let result = ProductForm {
            peso: peso.into(),
            estoque_minimo: minimo.into(),
            ..form()
        }
        .into_payload();
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn movement_form_parses_kind_and_quantity() {
        let id = Uuid::new_v4();
        let payload = MovementForm {
            produto_id: id.to_string(),
            tipo: "SAIDA".into(),
            quantidade: " 4 ".into(),
            observacao: "".into(),
        }
        .into_payload()
        .unwrap();

        assert_eq!(payload.produto_id, id);
        assert_eq!(payload.tipo, MovementKind::Saida);
        assert_eq!(payload.quantidade, 4);
        assert_eq!(payload.observacao, None);
    }

    #[test]
    fn movement_form_rejects_unknown_kind_and_bad_product() {
        let bad_kind = MovementForm {
            produto_id: Uuid::new_v4().to_string(),
            tipo: "transferencia".into(),
            quantidade: "1".into(),
            ..Default::default()
        };
        assert_matches!(bad_kind.into_payload(), Err(ServiceError::ValidationError(_)));

        let bad_product = MovementForm {
            produto_id: "".into(),
            quantidade: "1".into(),
            ..Default::default()
        };
        assert_matches!(bad_product.into_payload(), Err(ServiceError::ValidationError(_)));
    }
}
