use crate::{
    brevo::email::{Email, Mailbox},
    config::StoreConfig,
};

const SMALL_WRISTBAND_PRICE: u64 = 150;
const WRISTBAND_PRICE: u64 = 200;
const DEFAULT_PRICE: u64 = 2000;

/// Validated order, every required field is present and `quantity` is positive.
#[derive(Debug, Clone)]
pub struct Order<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub item: &'a str,
    pub quantity: u64,
    pub size: Option<&'a str>,
    pub color: Option<&'a str>,
}

/// Unit price in shillings from the static price table.
pub fn unit_price(item: &str, size: Option<&str>) -> u64 {
    let item = item.to_lowercase();
    if !item.contains("wristband") {
        return DEFAULT_PRICE;
    }
    let small = item.contains("small") || size.is_some_and(|s| s.trim().eq_ignore_ascii_case("small"));
    if small {
        SMALL_WRISTBAND_PRICE
    } else {
        WRISTBAND_PRICE
    }
}

/// `None` when the total does not fit in a u64.
pub fn total(item: &str, size: Option<&str>, quantity: u64) -> Option<u64> {
    unit_price(item, size).checked_mul(quantity)
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

const STYLE: &str = r#"
      body { font-family: 'Arial', sans-serif; background-color: #f8f9fb; color: #333; margin: 0; padding: 0; }
      .container { max-width: 600px; margin: 20px auto; background: #ffffff; border-radius: 12px; box-shadow: 0 4px 12px rgba(0,0,0,0.1); overflow: hidden; }
      .header { background: linear-gradient(90deg, #001f3f, #e50914); color: #fff; text-align: center; padding: 20px; }
      .content { padding: 20px; line-height: 1.6; }
      .order-summary { background-color: #f1f3f6; border-radius: 10px; padding: 15px; margin: 15px 0; }
      .footer { text-align: center; padding: 15px; background-color: #111; color: #bbb; font-size: 13px; }
      .payment { background-color: #fff3cd; border: 1px solid #ffeeba; border-radius: 10px; padding: 15px; margin-top: 10px; }
"#;

fn summary_rows(order: &Order<'_>, total: u64) -> String {
    format!(
        r#"<p><strong>Item:</strong> {item}</p>
        <p><strong>Quantity:</strong> {quantity}</p>
        <p><strong>Size:</strong> {size}</p>
        <p><strong>Color:</strong> {color}</p>
        <p><strong>Total:</strong> Ksh {total}</p>
        <p><strong>Phone:</strong> {phone}</p>"#,
        item = escape(order.item),
        quantity = order.quantity,
        size = escape(order.size.unwrap_or("N/A")),
        color = escape(order.color.unwrap_or("N/A")),
        phone = escape(order.phone),
    )
}

/// Confirmation sent to the customer, with manual paybill instructions.
pub fn customer_email<'a>(order: &Order<'a>, total: u64, store: &StoreConfig, year: i32) -> Email<'a> {
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Order Confirmation</title>
    <style>{STYLE}</style>
  </head>
  <body>
    <div class="container">
      <div class="header"><h1>44 Bulldogs FC Official Merch</h1></div>
      <div class="content">
        <h2>Hey {name},</h2>
        <p>Thank you for supporting <strong>44 Bulldogs FC</strong> through your merch order!</p>
        <p>Your order details are as follows:</p>
        <div class="order-summary">
        {rows}
        </div>
        <div class="payment">
          <p><strong>Next Step:</strong> To confirm your order, please make payment to:</p>
          <p>
            <strong>Paybill:</strong> {paybill}<br/>
            <strong>Account Number:</strong> {account_number}<br/>
            <strong>Account Name:</strong> {account_name}
          </p>
          <p>Once payment is made, your order will be processed and you'll be notified when it's ready for delivery or collection.</p>
        </div>
        <p style="margin-top: 20px;">
          <strong>The 44 Bulldogs FC &amp; {account_name} Team</strong><br/>
          <em>"We Are The Pack. Uma Wao!!"</em>
        </p>
      </div>
      <div class="footer">
        <p>&copy; {year} {account_name} | All Rights Reserved</p>
      </div>
    </div>
  </body>
</html>"#,
        name = escape(order.name),
        rows = summary_rows(order, total),
        paybill = escape(&store.paybill),
        account_number = escape(&store.account_number),
        account_name = escape(&store.account_name),
    );
    Email {
        to: Mailbox {
            email: order.email,
            name: order.name,
        },
        subject: "Your 44 Bulldogs Order Confirmation".to_string(),
        html,
    }
}

/// Notification sent to the store admin.
pub fn admin_email<'a>(
    order: &Order<'_>,
    total: u64,
    store: &StoreConfig,
    admin: Mailbox<'a>,
) -> Email<'a> {
    let html = format!(
        r#"<h2>New Order Received</h2>
        <p><strong>Customer Name:</strong> {name}</p>
        <p><strong>Email:</strong> {email}</p>
        {rows}
        <p><strong>Payment:</strong> Expected via Paybill {paybill} (Account {account_number}, {account_name})</p>"#,
        name = escape(order.name),
        email = escape(order.email),
        rows = summary_rows(order, total),
        paybill = escape(&store.paybill),
        account_number = escape(&store.account_number),
        account_name = escape(&store.account_name),
    );
    Email {
        to: admin,
        subject: format!("New 44 Bulldogs Order from {}", order.name),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order<'static> {
        Order {
            name: "Jane <script>",
            email: "jane@example.com",
            phone: "0712345678",
            item: "Home Jersey",
            quantity: 2,
            size: Some("M"),
            color: None,
        }
    }

    fn store() -> StoreConfig {
        StoreConfig {
            paybill: "600100".into(),
            account_number: "440047".into(),
            account_name: "Ujana na Ujuzi".into(),
        }
    }

    #[test]
    fn price_table() {
        assert_eq!(total("Bulldogs Wristband", Some("Small"), 3), Some(450));
        assert_eq!(total("Small Wristband", None, 2), Some(300));
        assert_eq!(total("Bulldogs Wristband", Some("Large"), 3), Some(600));
        assert_eq!(total("Bulldogs Wristband", None, 1), Some(200));
        assert_eq!(total("bulldogs wristband", Some("small"), 1), Some(150));
        assert_eq!(total("Home Jersey", Some("Small"), 2), Some(4000));
        assert_eq!(total("Hoodie", None, 1), Some(2000));
    }

    #[test]
    fn total_overflow_is_none() {
        assert_eq!(total("Hoodie", None, u64::MAX), None);
    }

    #[test]
    fn customer_email_escapes_and_summarises() {
        let email = customer_email(&order(), 4000, &store(), 2025);
        assert_eq!(email.to.email, "jane@example.com");
        assert!(email.html.contains("Hey Jane &lt;script&gt;,"));
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("Ksh 4000"));
        assert!(email.html.contains("<strong>Color:</strong> N/A"));
        assert!(email.html.contains("<strong>Paybill:</strong> 600100"));
        assert!(email.html.contains("2025 Ujana na Ujuzi"));
    }

    #[test]
    fn admin_email_goes_to_admin() {
        let admin = Mailbox {
            email: "admin@example.com",
            name: "Admin",
        };
        let email = admin_email(&order(), 4000, &store(), admin);
        assert_eq!(email.to.email, "admin@example.com");
        assert_eq!(email.subject, "New 44 Bulldogs Order from Jane <script>");
        assert!(email.html.contains("jane@example.com"));
        assert!(email.html.contains("Paybill 600100"));
    }
}
