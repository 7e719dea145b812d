use chrono::NaiveDate;
use serde_json::json;
use warehouse_movement_reports::{
    process_with_verification, IngestionConfig, ReportRequest, Session,
};

fn main() {
    let operations = vec![
        json!({
            "id": "rec-001",
            "formType": "variable-weight-recepcion",
            "formData": {
                "cliente": "Frigorifico Norte",
                "fecha": "2024-03-04",
                "items": [
                    {"paleta": 501, "descripcion": "Beef cuts", "pesoNeto": 820.5, "temperatura": -19},
                    {"paleta": 502, "descripcion": "Beef cuts", "pesoNeto": 815.0, "temperatura": -18},
                    {"paleta": 503, "descripcion": "Cheese", "pesoNeto": 640.0, "temperatura": 4}
                ]
            }
        }),
        json!({
            "id": "des-001",
            "formType": "fixed-weight-despacho",
            "formData": {
                "nombreCliente": "Frigorifico Norte",
                "fecha": "2024-03-06",
                "productos": [{"descripcion": "Cheese boxes", "paletas": 1, "pesoNeto": 600, "temperatura": 3}]
            }
        }),
        json!({
            "id": "des-002",
            "formType": "variable-weight-despacho",
            "createdAt": "2024-03-07T03:15:00Z",
            "formData": {
                "cliente": "Frigorifico Norte",
                "items": [{"paleta": 0, "totalPaletas": 2, "totalPesoNeto": 1635.5, "temperatura": -18}]
            }
        }),
    ];

    let inventory = vec![(
        "2024-03-03".to_string(),
        json!({"rows": [
            {"PROPIETARIO": "Frigorifico Norte", "PALETA": 410, "SE": "CO"},
            {"PROPIETARIO": "Frigorifico Norte", "PALETA": 411, "SE": "RE"},
            {"PROPIETARIO": "Lacteos Sur", "PALETA": 900, "SE": "RE"}
        ]}),
    )];

    let request = ReportRequest::new(
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
    );

    let reports = process_with_verification(
        &operations,
        &inventory,
        &IngestionConfig::default(),
        &request,
    )
    .expect("reports should compose with continuous balances");

    println!("Billing (all sessions):");
    for row in &reports.billing.rows {
        println!(
            " {} {:<18} open {:>3} +{:<3} -{:<3} close {:>3}",
            row.balance.date,
            row.client_name,
            row.balance.opening_balance,
            row.balance.pallets_received,
            row.balance.pallets_dispatched,
            row.balance.closing_balance
        );
    }

    let refrigerated = process_with_verification(
        &operations,
        &inventory,
        &IngestionConfig::default(),
        &request.clone().with_session(Session::Refrigerated),
    )
    .expect("refrigerated reports should compose");

    println!("Billing ({}):", Session::Refrigerated.code());
    for row in &refrigerated.billing.rows {
        println!(
            " {} {:<18} close {:>3}",
            row.balance.date, row.client_name, row.balance.closing_balance
        );
    }

    println!(
        "{}",
        reports
            .billing
            .to_json()
            .expect("billing report should serialize")
    );
}
