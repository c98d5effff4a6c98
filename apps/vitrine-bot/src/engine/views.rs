//! Declarative reply builders for every screen of the ticket flow.
//!
//! Texts are the storefront's user-facing Portuguese; the gateway owns
//! the actual visual encoding.

use vitrine_shared::{
    Amount, Button, ButtonStyle, ChannelId, Reply, SelectMenu, SelectOption, Service, UserId,
};

use crate::models::history::{TransactionKind, TransactionRecord};
use crate::models::session::{ActiveDeposit, ActiveRental};
use crate::services::catalog_service::CatalogPage;

pub fn terms(user_id: UserId) -> Reply {
    Reply::text(format!(
        "📋 Olá, <@{user_id}>! Leia os Termos de Uso\n\n\
         Regras do Sistema:\n\
         1. O número é único e exclusivo para você.\n\
         2. Utilize apenas para fins legais.\n\
         3. O código SMS deve ser usado dentro de 10 minutos.\n\n\
         ⚠️ Garantia: se o código não chegar, o saldo é estornado automaticamente."
    ))
    .with_button(Button::new(
        "aceitar_termos",
        "Concordar e Continuar",
        ButtonStyle::Success,
    ))
    .with_button(Button::new("negar_termos", "Cancelar", ButtonStyle::Danger))
}

pub fn menu(user_id: UserId, balance: Amount) -> Reply {
    Reply::text(format!(
        "Painel do Usuário\n\
         Cliente: <@{user_id}>\n\
         Saldo: R$ {balance}\n\n\
         Como funciona?\n\
         • Clique em Comprar Serviços para abrir o catálogo.\n\
         • Escolha a plataforma e confirme o pagamento com seu saldo.\n\
         • O número aparecerá aqui. Aguarde o código SMS ser recebido."
    ))
    .with_select(SelectMenu {
        id: "menu_selecao".into(),
        placeholder: "Selecione uma opção (Histórico / Saldo)".into(),
        options: vec![
            SelectOption {
                value: "menu_historico".into(),
                label: "Histórico de Compras".into(),
                description: Some("Veja seus números comprados e códigos recebidos".into()),
            },
            SelectOption {
                value: "menu_depositar".into(),
                label: "Adicionar Saldo".into(),
                description: Some("Adicione saldo via PIX para comprar números".into()),
            },
        ],
    })
    .with_button(Button::new(
        "menu_comprar",
        "Comprar Serviços",
        ButtonStyle::Success,
    ))
    .with_button(Button::new("fechar_ticket", "Fechar Ticket", ButtonStyle::Danger))
}

pub fn catalog(page: &CatalogPage) -> Reply {
    let options: Vec<SelectOption> = if page.services.is_empty() {
        vec![SelectOption {
            value: "null".into(),
            label: "Vazio".into(),
            description: Some("Nenhum serviço aqui.".into()),
        }]
    } else {
        page.services
            .iter()
            .map(|s| SelectOption {
                value: format!("sms_{}", s.id),
                label: s.name.clone(),
                description: Some(format!("Preço: R$ {} | Estoque: {}", s.price, s.stock)),
            })
            .collect()
    };

    Reply::text(format!(
        "📱 Catálogo de Serviços (Pág {}/{})\n\
         Escolha abaixo a plataforma que deseja receber o SMS.",
        page.page + 1,
        page.total_pages
    ))
    .with_select(SelectMenu {
        id: "select_servico".into(),
        placeholder: "🔻 Clique para selecionar um serviço...".into(),
        options,
    })
    .with_button(
        Button::new("pag_ant", "Anterior", ButtonStyle::Secondary).disabled(page.page == 0),
    )
    .with_button(Button::new("voltar_menu", "Menu Inicial", ButtonStyle::Danger))
    .with_button(
        Button::new("pag_prox", "Próximo", ButtonStyle::Secondary)
            .disabled(page.page + 1 >= page.total_pages),
    )
}

pub fn confirm(service: &Service, balance: Amount) -> Reply {
    let affordable = balance >= service.price;
    let verdict = if affordable {
        "✅ Saldo Suficiente!"
    } else {
        "❌ Saldo Insuficiente!"
    };
    let mut reply = Reply::text(format!(
        "🛒 Confirmar Pedido: {}\n\
         Valor: R$ {}\n\
         Seu Saldo: R$ {}\n\
         Saldo Restante: R$ {}\n\n\
         {verdict}",
        service.name,
        service.price,
        balance,
        balance - service.price,
    ));
    if affordable {
        reply = reply
            .with_button(Button::new(
                "confirmar_compra",
                "Confirmar Pagamento",
                ButtonStyle::Success,
            ))
            .with_button(Button::new("cancelar_compra", "Cancelar", ButtonStyle::Secondary));
    } else {
        reply = reply
            .with_button(Button::new("menu_depositar", "Recarregar", ButtonStyle::Primary))
            .with_button(Button::new("cancelar_compra", "Voltar", ButtonStyle::Secondary));
    }
    reply
}

pub fn purchase_success(rental: &ActiveRental) -> Reply {
    Reply::text(format!(
        "✅ Sucesso!\n\
         📱 {}\n\
         Serviço: {}\n\
         ID: {}\n\n\
         Aguardando… o código SMS aparecerá aqui em breve.",
        rental.phone_number, rental.service_name, rental.id
    ))
    .with_button(Button::new("menu_comprar", "Comprar Mais", ButtonStyle::Success))
    .with_button(Button::new(
        "cancelar_sms",
        "Cancelar/Reembolso",
        ButtonStyle::Danger,
    ))
}

pub fn code_received(rental: &ActiveRental, code: &str) -> Reply {
    Reply::text(format!(
        "✅ Sucesso!\n\
         📱 {}\n\
         Serviço: {}\n\
         ID: {}\n\n\
         📬 Código Recebido: {code}",
        rental.phone_number, rental.service_name, rental.id
    ))
    .with_button(Button::new("menu_comprar", "Comprar Mais", ButtonStyle::Success))
}

pub fn purchase_failed(detail: &str) -> Reply {
    Reply::text(format!(
        "❌ Erro na compra: {detail}\nNada foi cobrado do seu saldo."
    ))
    .with_button(Button::new("voltar_menu", "Voltar", ButtonStyle::Secondary))
}

pub fn refund_done(price: Amount, new_balance: Amount) -> Reply {
    Reply::text(format!(
        "✅ SMS Cancelado com Sucesso!\n\
         💰 R$ {price} foram estornados ao seu saldo.\n\n\
         Novo Saldo: R$ {new_balance}"
    ))
    .with_button(Button::new("voltar_menu", "Voltar", ButtonStyle::Secondary))
}

pub fn history(records: &[TransactionRecord]) -> Reply {
    let mut content = String::from("📜 Seu Histórico de Compras\n\n");
    if records.is_empty() {
        content.push_str("Você ainda não realizou nenhuma compra.");
    } else {
        content.push_str(&format!("Total de transações: {}\n\n", records.len()));
        // last 10, most recent first
        for (i, record) in records.iter().rev().take(10).enumerate() {
            match record.kind {
                TransactionKind::Deposit => content.push_str(&format!(
                    "{}. 💰 Depósito PIX | Valor: R$ {} | Status: {}\n",
                    i + 1,
                    record.amount,
                    record.status.label()
                )),
                TransactionKind::Purchase => {
                    content.push_str(&format!(
                        "{}. Plataforma: {} | Valor: R$ {} | Status: {}\n",
                        i + 1,
                        record.service_name.as_deref().unwrap_or("?"),
                        record.amount,
                        record.status.label()
                    ));
                    if let Some(number) = &record.phone_number {
                        content.push_str(&format!("> Número: {number}\n"));
                    }
                    if let Some(code) = &record.sms_code {
                        content.push_str(&format!("> Código: {code}\n"));
                    }
                }
            }
        }
    }
    Reply::text(content).with_button(Button::new("voltar_menu", "Voltar", ButtonStyle::Secondary))
}

pub fn deposit_prompt() -> Reply {
    Reply::text(
        "💰 Adicionar Saldo\n\
         Qual valor deseja depositar? (R$)\n\
         Ex: 10.00 — o mínimo é R$ 1,00.",
    )
}

pub fn invalid_deposit_amount() -> Reply {
    Reply::text("❌ Valor inválido. O mínimo é R$ 1,00.")
}

pub fn pix_created(deposit: &ActiveDeposit) -> Reply {
    Reply::text(format!(
        "💠 Depósito PIX\n\
         Valor: R$ {}\n\n\
         Copia e Cola:\n{}\n\n\
         O PIX expira em 5 minutos.",
        deposit.amount, deposit.copy_paste_code
    ))
    .with_button(Button::new("copiar_pix", "Copiar Código", ButtonStyle::Primary))
}

pub fn pix_code(code: &str) -> Reply {
    Reply::text(code)
}

pub fn pix_not_found() -> Reply {
    Reply::text("❌ Código PIX não encontrado ou expirado.")
}

pub fn deposit_approved(amount: Amount, new_balance: Amount) -> Reply {
    Reply::text(format!(
        "✅ Pagamento Confirmado! R$ {amount} foram adicionados ao seu saldo.\n\
         Novo Saldo: R$ {new_balance}"
    ))
    .with_button(Button::new("voltar_menu", "Voltar", ButtonStyle::Secondary))
}

pub fn deposit_rejected() -> Reply {
    Reply::text("❌ Pagamento não aprovado. Nenhum valor foi adicionado ao seu saldo.")
}

pub fn pix_expired() -> Reply {
    Reply::text("⚠️ Seu PIX expirou e foi cancelado. Nenhum valor foi cobrado.")
}

pub fn deposit_failed(detail: &str) -> Reply {
    Reply::text(format!("❌ Erro ao gerar pagamento: {detail}"))
}

pub fn ticket_exists(channel_id: ChannelId) -> Reply {
    Reply::text(format!("❌ Você já tem um ticket: <#{channel_id}>"))
}

pub fn ticket_inactive() -> Reply {
    Reply::text("❌ Este ticket não está mais ativo.")
}

pub fn closing(refund: Option<(Amount, Amount)>) -> Reply {
    match refund {
        Some((price, new_balance)) => Reply::text(format!(
            "✅ Reembolso automático: R$ {price} estornados ao fechar o ticket.\n\
             Novo Saldo: R$ {new_balance}\n\n\
             🔒 Ticket sendo encerrado...",
        )),
        None => Reply::text("🔒 Ticket sendo encerrado..."),
    }
}

pub fn closed_by_user() -> Reply {
    Reply::text("🔒 Ticket fechado pelo usuário.")
}

pub fn closed_by_inactivity() -> Reply {
    Reply::text("🔒 Ticket encerrado por inatividade.")
}

pub fn not_configured() -> Reply {
    Reply::text("❌ O administrador ainda não configurou este recurso.")
}

pub fn notice(text: &str) -> Reply {
    Reply::text(text)
}

pub fn generic_error() -> Reply {
    Reply::text("❌ Ocorreu um erro inesperado. Tente novamente.")
}
